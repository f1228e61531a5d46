// Shared helpers for the integration tests: a scripted track that answers the motion
// controller with the line frames it would see on the arena.

#![allow(dead_code)]

use agv_core::navigation::{MotionController, MotionState};
use agv_core::{AgvConfig, Timestamp};

pub const CENTRED: [bool; 4] = [false, true, true, false];
pub const CROSSING: [bool; 4] = [true, true, true, true];
pub const OFF: [bool; 4] = [false; 4];

/// Control period used by every simulated loop, ms
pub const STEP_MS: u32 = 5;

/// Time spent following the line between two junctions, ms
pub const SEGMENT_MS: u32 = 300;

pub fn t(ms: u32) -> Timestamp {
    Timestamp::from_millis(ms)
}

/// Defaults with an unfiltered line sensor so every scripted frame is seen as-is.
pub fn test_config() -> AgvConfig {
    let mut config = AgvConfig::default();
    config.motion.filter_window = 1;
    config
}

/// A track where every line segment ends in a crossing after `SEGMENT_MS`.
#[derive(Debug)]
pub struct Track {
    last: [bool; 4],
}

impl Track {
    pub fn new() -> Self {
        Track { last: CENTRED }
    }

    /// Frame the sensors see next, given what the robot is doing.
    pub fn frame(&mut self, motion: &MotionController, now: Timestamp) -> [bool; 4] {
        let frame = match motion.state() {
            MotionState::Rest => CENTRED,
            MotionState::FollowingLine if motion.time_in_state(now) >= SEGMENT_MS => CROSSING,
            MotionState::FollowingLine => CENTRED,
            MotionState::PreJunction => CROSSING,
            // Spinning on a junction the inner pair keeps leaving and finding a line.
            MotionState::Junction if self.last == CENTRED => OFF,
            MotionState::Junction => CENTRED,
        };
        self.last = frame;
        frame
    }
}
