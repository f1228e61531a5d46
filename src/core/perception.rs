// core/perception.rs

// Bay occupancy from the side-facing time-of-flight sensors. A handful of readings is
// taken while the robot crawls over a junction and averaged into an occupied/free call.
// Bad readings are dropped here and never reported upward.

use log::{debug, info};

use crate::config::OccupancyConfig;
use crate::hardware::{DistanceSensorCapability, SensorSide};

/// Sampler states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccupancyState {
    Rest,
    AcquiringReadings,
    Complete,
}

/// Sensor facing the bays beside `node`.
///
/// Junctions J1-J6 and J19-J24 have their bays on the right, J7-J18 on the left.
/// Anything else falls back to the right sensor.
pub fn sensor_side_for(node: &str) -> SensorSide {
    let number = node
        .strip_prefix('J')
        .and_then(|rest| rest.parse::<u32>().ok());
    match number {
        Some(7..=18) => SensorSide::Left,
        _ => SensorSide::Right,
    }
}

/// Distance-based bay occupancy sampler
pub struct BayOccupancySampler {
    sensor: Box<dyn DistanceSensorCapability>,
    config: OccupancyConfig,
    state: OccupancyState,
    readings: Vec<u16>,
    attempts: u32,
    occupied: bool,
}

impl BayOccupancySampler {
    pub fn new(config: &OccupancyConfig, sensor: Box<dyn DistanceSensorCapability>) -> Self {
        BayOccupancySampler {
            sensor,
            config: config.clone(),
            state: OccupancyState::Rest,
            readings: Vec::new(),
            attempts: 0,
            occupied: false,
        }
    }

    pub fn state(&self) -> OccupancyState {
        self.state
    }

    /// Verdict of the last completed sampling run
    pub fn occupied(&self) -> Option<bool> {
        (self.state == OccupancyState::Complete).then_some(self.occupied)
    }

    pub fn start_reading(&mut self) {
        debug!("Occupancy: start reading");
        self.state = OccupancyState::AcquiringReadings;
    }

    pub fn reset(&mut self) {
        self.readings.clear();
        self.attempts = 0;
        self.occupied = false;
        self.state = OccupancyState::Rest;
    }

    /// Take one reading from `side`, or decide once enough have been taken.
    pub fn tick(&mut self, side: SensorSide) {
        if self.state != OccupancyState::AcquiringReadings {
            return;
        }

        let valid = self.readings.len() as u32;
        if valid >= self.config.target_valid || self.attempts >= self.config.max_attempts {
            self.decide();
            return;
        }

        self.attempts += 1;
        match self.sensor.read_mm(side) {
            Some(mm) if mm > self.config.saturation_ceiling_mm => {
                debug!("Occupancy: saturated reading {} discarded", mm);
            }
            Some(mm) => self.readings.push(mm),
            None => {}
        }
    }

    fn decide(&mut self) {
        let far = self.config.far_value_mm;
        if self.readings.is_empty() {
            self.occupied = false;
        } else {
            let total: u32 = self
                .readings
                .iter()
                .map(|&mm| u32::from(if mm == 0 { far } else { mm }))
                .sum();
            let mean = total as f32 / self.readings.len() as f32;
            self.occupied = mean < f32::from(self.config.occupied_threshold_mm);
        }
        info!(
            "Occupancy: bay occupied {} from {:?} after {} attempts",
            self.occupied, self.readings, self.attempts
        );
        self.state = OccupancyState::Complete;
    }
}
