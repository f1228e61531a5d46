//! Hardware capability interfaces for the AGV core
//!
//! The control core never touches pins, PWM slices, ADCs or I2C buses directly.
//! Drivers implement the traits in this module; the state machines only see:
//! - Two-motor drive (direction + 16-bit duty)
//! - Two servos addressed by pulse width
//! - A four-channel binary line sensor array
//! - Left/right time-of-flight distance sensors
//! - A resistance ADC, the start button and the indicator LEDs

pub mod sim;

pub use sim::*;

use serde::{Deserialize, Serialize};

/// Drive motor selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotorId {
    /// Left wheel
    Left,
    /// Right wheel
    Right,
}

/// Motor rotation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Wheel drives the robot forward
    Forward,
    /// Wheel drives the robot backward
    Reverse,
}

/// Grabber servo selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServoId {
    /// Jaw that clamps the reel
    Jaw,
    /// Arm that lifts the jaw
    Lifter,
}

/// Line sensor channels, left to right across the front of the robot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineChannel {
    /// Outer left sensor
    OuterLeft,
    /// Inner left sensor
    InnerLeft,
    /// Inner right sensor
    InnerRight,
    /// Outer right sensor
    OuterRight,
}

impl LineChannel {
    /// All channels in array order
    pub const ALL: [LineChannel; 4] = [
        LineChannel::OuterLeft,
        LineChannel::InnerLeft,
        LineChannel::InnerRight,
        LineChannel::OuterRight,
    ];
}

/// Side of the robot a distance sensor faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorSide {
    /// Left-facing sensor
    Left,
    /// Right-facing sensor
    Right,
}

/// Two-motor drive.
#[cfg_attr(test, mockall::automock)]
pub trait DriveCapability {
    /// Set a motor's direction and duty cycle (0..=65535).
    fn set(&mut self, motor: MotorId, direction: Direction, duty: u16);
}

/// Hobby servo output.
#[cfg_attr(test, mockall::automock)]
pub trait ServoCapability {
    /// Command a servo pulse width in microseconds.
    fn set_pulse_width(&mut self, servo: ServoId, micros: u16);
}

/// Binary line sensor array.
#[cfg_attr(test, mockall::automock)]
pub trait LineSensorCapability {
    /// True when the channel sees the line.
    fn read_digital(&mut self, channel: LineChannel) -> bool;
}

/// Time-of-flight ranging.
#[cfg_attr(test, mockall::automock)]
pub trait DistanceSensorCapability {
    /// Latest range in millimetres, `None` when no measurement is ready.
    fn read_mm(&mut self, side: SensorSide) -> Option<u16>;
}

/// Reel resistance sensing.
#[cfg_attr(test, mockall::automock)]
pub trait ResistanceAdcCapability {
    /// Raw 16-bit ADC reading across the reel contacts.
    fn read_raw(&mut self) -> u16;
}

/// Start/abort push button.
#[cfg_attr(test, mockall::automock)]
pub trait ButtonCapability {
    /// Raw (undebounced) pressed level.
    fn read_raw(&mut self) -> bool;
}

/// Reel indicator LEDs.
#[cfg_attr(test, mockall::automock)]
pub trait IndicatorCapability {
    /// Switch every LED.
    fn set_all(&mut self, on: bool);
    /// Switch a single LED by index.
    fn set_one(&mut self, id: usize, on: bool);
}

/// One driver per capability, handed to [`crate::Agv::new`].
pub struct Hardware {
    /// Wheel motors
    pub drive: Box<dyn DriveCapability>,
    /// Jaw and lifter servos
    pub servos: Box<dyn ServoCapability>,
    /// Line sensor array
    pub line_sensors: Box<dyn LineSensorCapability>,
    /// Side distance sensors
    pub distance: Box<dyn DistanceSensorCapability>,
    /// Reel resistance ADC
    pub adc: Box<dyn ResistanceAdcCapability>,
    /// Start/abort button
    pub button: Box<dyn ButtonCapability>,
    /// Reel indicator LEDs
    pub indicator: Box<dyn IndicatorCapability>,
}

impl Hardware {
    /// Every capability backed by `bench`.
    pub fn bench(bench: &Bench) -> Self {
        Hardware {
            drive: Box::new(bench.drive()),
            servos: Box::new(bench.servos()),
            line_sensors: Box::new(bench.line_sensors()),
            distance: Box::new(bench.distance()),
            adc: Box::new(bench.adc()),
            button: Box::new(bench.button()),
            indicator: Box::new(bench.indicator()),
        }
    }
}
