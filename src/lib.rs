//! AGV Core - decision and control for a line-following reel delivery robot
//!
//! This library provides the mission state machine, graph routing, line-following motion
//! control, grabber sequencing and bay sensing for the AGV. Hardware is reached only
//! through the capability traits in [`hardware`].

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

pub mod config;
pub mod core;
pub mod grabber;
pub mod hardware;
pub mod navigation;

use std::sync::Arc;

use log::info;
use thiserror::Error;

// Re-export commonly used items for easier access
pub use crate::config::{AgvConfig, ConfigError};
pub use crate::core::{MissionController, MissionFault, MissionState, Timestamp};
pub use crate::hardware::{Bench, Hardware};
pub use crate::navigation::{GraphRouter, MapError, NavigationError, Navigator, NodeMap};

use crate::core::{BayOccupancySampler, ButtonDebouncer, IndicatorPanel, TickQueue, TickRequest, Ticker};
use crate::grabber::GrabberController;
use crate::navigation::MotionController;

/// AGV error types
#[derive(Debug, Error)]
pub enum AgvError {
    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Map could not be loaded
    #[error("map error: {0}")]
    Map(#[from] MapError),
    /// Navigation failed
    #[error("navigation error: {0}")]
    Navigation(#[from] NavigationError),
}

/// Primary entry point: owns every component and runs one control pass at a time
pub struct Agv {
    mission: MissionController,
    button: ButtonDebouncer,
    queue: TickQueue,
    ticker: Ticker,
    passes: u64,
}

impl Agv {
    /// Build the robot from `config` and its hardware drivers.
    ///
    /// The map comes from `config.map_file` when set, otherwise the built-in arena.
    pub fn new(config: &AgvConfig, hardware: Hardware, now: Timestamp) -> Result<Self, AgvError> {
        config.validate()?;
        let map = match &config.map_file {
            Some(path) => {
                info!("Loading map from {}", path.display());
                NodeMap::from_yaml_file(path)?
            }
            None => NodeMap::standard(),
        };
        let router = GraphRouter::new(Arc::new(map));

        let motion = MotionController::new(&config.motion, hardware.drive, hardware.line_sensors);
        let sampler = BayOccupancySampler::new(&config.occupancy, hardware.distance);
        let navigator = Navigator::new(&config.navigation, router, motion, sampler);
        let grabber = GrabberController::new(
            &config.grabber,
            &config.resistance,
            hardware.servos,
            hardware.adc,
            now,
        );
        let panel = IndicatorPanel::new(&config.panel, hardware.indicator);

        info!(
            "AGV ready at {} facing {}, control loop {} Hz",
            config.navigation.start_node, config.navigation.start_orientation, config.control_loop_hz
        );
        Ok(Agv {
            mission: MissionController::new(&config.mission, navigator, grabber, panel),
            button: ButtonDebouncer::new(hardware.button, config.panel.button_debounce_ms),
            queue: TickQueue::new(),
            ticker: Ticker::from_rate(config.control_loop_hz),
            passes: 0,
        })
    }

    /// One cooperative pass: run due ticks, handle the button, then step the mission.
    ///
    /// Call as often as convenient; ticks only run once their period has elapsed.
    pub fn run_pass(&mut self, now: Timestamp) {
        self.passes += 1;
        self.ticker.poll(now, &mut self.queue);
        while let Some(request) = self.queue.pop() {
            match request {
                TickRequest::Motion => self.mission.navigator_mut().motion_mut().tick(now),
                TickRequest::Debounce => self.button.poll(now),
            }
        }

        if self.button.take_press(now) {
            if self.mission.is_running() {
                self.mission.abort(now);
            } else if !self.mission.state().is_terminal() {
                self.mission.start(now);
            }
        }
        self.mission.tick(now);
    }

    /// Mission state
    pub fn state(&self) -> &MissionState {
        self.mission.state()
    }

    /// True once the run is over, normally or not
    pub fn is_finished(&self) -> bool {
        self.mission.state().is_terminal()
    }

    /// The mission, for inspection
    pub fn mission(&self) -> &MissionController {
        &self.mission
    }

    /// Passes run so far
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Milliseconds between control ticks
    pub fn control_period_ms(&self) -> u32 {
        self.ticker.period_ms()
    }
}
