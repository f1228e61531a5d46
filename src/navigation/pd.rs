// src/navigation/pd.rs
// PD steering correction for line following.

use nalgebra::Vector4;

use crate::core::clock::Timestamp;

use super::line_sensor::LineFrame;

/// Channel weights from outer left to outer right.
const ERROR_WEIGHTS: [f32; 4] = [-3.0, -1.0, 1.0, 3.0];

/// Weighted lateral offset of the line under the array.
///
/// Negative when the line is to the left. When no channel sees the line the last
/// offset is held so the robot keeps steering back towards it.
#[derive(Debug, Clone, Default)]
pub struct LateralError {
    last: f32,
}

impl LateralError {
    pub fn new() -> Self {
        LateralError::default()
    }

    pub fn update(&mut self, frame: &LineFrame) -> f32 {
        let levels = frame.as_vector();
        let active = levels.sum();
        if active > 0.0 {
            self.last = levels.dot(&Vector4::from(ERROR_WEIGHTS)) / active;
        }
        self.last
    }
}

/// PID controller with a zero setpoint, used with `ki = 0` as a PD loop.
#[derive(Debug, Clone)]
pub struct PdController {
    kp: f32,
    ki: f32,
    kd: f32,
    limit: f32,
    integral: f32,
    last_input: Option<f32>,
    last_time: Option<Timestamp>,
}

impl PdController {
    /// Output is clamped to `±limit`.
    pub fn new(kp: f32, ki: f32, kd: f32, limit: f32) -> Self {
        PdController {
            kp,
            ki,
            kd,
            limit: limit.abs(),
            integral: 0.0,
            last_input: None,
            last_time: None,
        }
    }

    /// Replace the gains, keeping accumulated state.
    pub fn set_tunings(&mut self, kp: f32, ki: f32, kd: f32) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
    }

    pub fn tunings(&self) -> (f32, f32, f32) {
        (self.kp, self.ki, self.kd)
    }

    /// Forget the integral and derivative memory.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_input = None;
        self.last_time = None;
    }

    /// Correction for `input` measured at `now`.
    pub fn next(&mut self, input: f32, now: Timestamp) -> f32 {
        let dt = self
            .last_time
            .map(|last| now.elapsed_since(last).max(1) as f32 / 1000.0)
            .unwrap_or(0.0);
        let error = -input;

        let proportional = self.kp * error;
        if dt > 0.0 {
            self.integral = (self.integral + self.ki * error * dt).clamp(-self.limit, self.limit);
        }
        let derivative = match (self.last_input, dt > 0.0) {
            (Some(last), true) => -self.kd * (input - last) / dt,
            _ => 0.0,
        };

        self.last_input = Some(input);
        self.last_time = Some(now);
        (proportional + self.integral + derivative).clamp(-self.limit, self.limit)
    }
}
