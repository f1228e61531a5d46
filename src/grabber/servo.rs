// src/grabber/servo.rs
// Open-loop servo unit: there is no position feedback, so a move is assumed complete
// once the settle time has passed.

use log::debug;

use crate::config::ServoCalibration;
use crate::core::clock::Timestamp;
use crate::hardware::{ServoCapability, ServoId};

/// Named servo positions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoPosition {
    JawOpen,
    JawClosed,
    LifterDown,
    LifterMid,
    LifterUp,
    Mid,
}

impl ServoPosition {
    /// Calibrated pulse width in microseconds
    pub fn pulse_width(self, calibration: &ServoCalibration) -> u16 {
        match self {
            ServoPosition::JawOpen => calibration.jaw_open,
            ServoPosition::JawClosed => calibration.jaw_closed,
            ServoPosition::LifterDown => calibration.lifter_down,
            ServoPosition::LifterMid => calibration.lifter_mid,
            ServoPosition::LifterUp => calibration.lifter_up,
            ServoPosition::Mid => calibration.mid,
        }
    }
}

/// Servo unit states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoState {
    Rest,
    Turning,
    InPosition,
}

/// One servo with its own settle timer.
#[derive(Debug, Clone)]
pub struct ServoUnit {
    id: ServoId,
    settle_ms: u32,
    state: ServoState,
    position: Option<ServoPosition>,
    commanded_at: Option<Timestamp>,
}

impl ServoUnit {
    pub fn new(id: ServoId, settle_ms: u32) -> Self {
        ServoUnit {
            id,
            settle_ms,
            state: ServoState::Rest,
            position: None,
            commanded_at: None,
        }
    }

    pub fn state(&self) -> ServoState {
        self.state
    }

    /// Last commanded position
    pub fn position(&self) -> Option<ServoPosition> {
        self.position
    }

    /// Command `position`. A manual move leaves the unit state alone.
    pub fn set_position(
        &mut self,
        servos: &mut dyn ServoCapability,
        calibration: &ServoCalibration,
        position: ServoPosition,
        manual: bool,
        now: Timestamp,
    ) {
        if !manual {
            self.state = ServoState::Turning;
        }
        self.commanded_at = Some(now);
        self.position = Some(position);
        let width = position.pulse_width(calibration);
        debug!("Servo {:?}: {:?} ({} us)", self.id, position, width);
        servos.set_pulse_width(self.id, width);
    }

    pub fn tick(&mut self, now: Timestamp) {
        if self.state != ServoState::Turning {
            return;
        }
        if let Some(at) = self.commanded_at {
            if now.elapsed_since(at) > self.settle_ms {
                debug!("Servo {:?}: probably in position", self.id);
                self.state = ServoState::InPosition;
                self.commanded_at = None;
            }
        }
    }
}
