// src/hardware/sim.rs
// Host-side bench drivers: every capability backed by one shared, inspectable state.
// Used by the binary when no robot drivers are linked in and by the integration tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use log::trace;

use super::{
    ButtonCapability, Direction, DistanceSensorCapability, DriveCapability,
    IndicatorCapability, LineChannel, LineSensorCapability, MotorId, ResistanceAdcCapability,
    SensorSide, ServoCapability, ServoId,
};

/// Everything the bench drivers read from or write to.
#[derive(Debug, Default)]
pub struct BenchState {
    /// Last command per motor
    pub motors: HashMap<MotorId, (Direction, u16)>,
    /// Every drive command, oldest first
    pub drive_log: Vec<(MotorId, Direction, u16)>,
    /// Last pulse width per servo
    pub servos: HashMap<ServoId, u16>,
    /// Current line sensor frame [OL, IL, IR, OR]
    pub line: [bool; 4],
    /// Frames consumed one per array scan
    pub line_script: VecDeque<[bool; 4]>,
    /// Scripted ranges per side
    pub distances: HashMap<SensorSide, VecDeque<Option<u16>>>,
    /// Range returned once a side's script is empty
    pub default_distance: Option<u16>,
    /// Reel resistance ADC value
    pub resistance: u16,
    /// Scripted button levels, false once empty
    pub button: VecDeque<bool>,
    /// Indicator LED levels
    pub leds: [bool; 4],
}

/// Handle to a shared bench. Cloning shares the state.
#[derive(Debug, Clone, Default)]
pub struct Bench {
    state: Rc<RefCell<BenchState>>,
}

impl Bench {
    pub fn new() -> Self {
        Bench::default()
    }

    pub fn drive(&self) -> BenchDrive {
        BenchDrive(self.state.clone())
    }

    pub fn servos(&self) -> BenchServos {
        BenchServos(self.state.clone())
    }

    pub fn line_sensors(&self) -> BenchLineSensors {
        BenchLineSensors(self.state.clone())
    }

    pub fn distance(&self) -> BenchDistance {
        BenchDistance(self.state.clone())
    }

    pub fn adc(&self) -> BenchAdc {
        BenchAdc(self.state.clone())
    }

    pub fn button(&self) -> BenchButton {
        BenchButton(self.state.clone())
    }

    pub fn indicator(&self) -> BenchIndicator {
        BenchIndicator(self.state.clone())
    }

    /// Hold a line frame until changed.
    pub fn set_line(&self, frame: [bool; 4]) {
        self.state.borrow_mut().line = frame;
    }

    /// Queue line frames, one per sensor-array scan.
    pub fn push_line_frames(&self, frames: impl IntoIterator<Item = [bool; 4]>) {
        self.state.borrow_mut().line_script.extend(frames);
    }

    /// Queue ranges for one side.
    pub fn push_distances(&self, side: SensorSide, readings: impl IntoIterator<Item = Option<u16>>) {
        self.state
            .borrow_mut()
            .distances
            .entry(side)
            .or_default()
            .extend(readings);
    }

    pub fn set_default_distance(&self, mm: Option<u16>) {
        self.state.borrow_mut().default_distance = mm;
    }

    pub fn set_resistance(&self, raw: u16) {
        self.state.borrow_mut().resistance = raw;
    }

    /// Queue a single pressed sample followed by release.
    pub fn press_button(&self) {
        let mut state = self.state.borrow_mut();
        state.button.push_back(true);
        state.button.push_back(false);
    }

    pub fn motor(&self, motor: MotorId) -> Option<(Direction, u16)> {
        self.state.borrow().motors.get(&motor).copied()
    }

    pub fn servo(&self, servo: ServoId) -> Option<u16> {
        self.state.borrow().servos.get(&servo).copied()
    }

    pub fn leds(&self) -> [bool; 4] {
        self.state.borrow().leds
    }

    pub fn drive_log_len(&self) -> usize {
        self.state.borrow().drive_log.len()
    }

    /// True when both motors were last commanded to zero duty.
    pub fn motors_stopped(&self) -> bool {
        let state = self.state.borrow();
        [MotorId::Left, MotorId::Right]
            .iter()
            .all(|m| state.motors.get(m).map_or(true, |&(_, duty)| duty == 0))
    }
}

pub struct BenchDrive(Rc<RefCell<BenchState>>);

impl DriveCapability for BenchDrive {
    fn set(&mut self, motor: MotorId, direction: Direction, duty: u16) {
        trace!("bench drive {:?} {:?} {}", motor, direction, duty);
        let mut state = self.0.borrow_mut();
        state.motors.insert(motor, (direction, duty));
        state.drive_log.push((motor, direction, duty));
    }
}

pub struct BenchServos(Rc<RefCell<BenchState>>);

impl ServoCapability for BenchServos {
    fn set_pulse_width(&mut self, servo: ServoId, micros: u16) {
        self.0.borrow_mut().servos.insert(servo, micros);
    }
}

pub struct BenchLineSensors(Rc<RefCell<BenchState>>);

impl LineSensorCapability for BenchLineSensors {
    fn read_digital(&mut self, channel: LineChannel) -> bool {
        let mut state = self.0.borrow_mut();
        // A scan always starts at the outer left channel.
        if channel == LineChannel::OuterLeft {
            if let Some(frame) = state.line_script.pop_front() {
                state.line = frame;
            }
        }
        let index = LineChannel::ALL
            .iter()
            .position(|&c| c == channel)
            .unwrap_or(0);
        state.line[index]
    }
}

pub struct BenchDistance(Rc<RefCell<BenchState>>);

impl DistanceSensorCapability for BenchDistance {
    fn read_mm(&mut self, side: SensorSide) -> Option<u16> {
        let mut state = self.0.borrow_mut();
        let fallback = state.default_distance;
        state
            .distances
            .get_mut(&side)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(fallback)
    }
}

pub struct BenchAdc(Rc<RefCell<BenchState>>);

impl ResistanceAdcCapability for BenchAdc {
    fn read_raw(&mut self) -> u16 {
        self.0.borrow().resistance
    }
}

pub struct BenchButton(Rc<RefCell<BenchState>>);

impl ButtonCapability for BenchButton {
    fn read_raw(&mut self) -> bool {
        self.0.borrow_mut().button.pop_front().unwrap_or(false)
    }
}

pub struct BenchIndicator(Rc<RefCell<BenchState>>);

impl IndicatorCapability for BenchIndicator {
    fn set_all(&mut self, on: bool) {
        self.0.borrow_mut().leds = [on; 4];
    }

    fn set_one(&mut self, id: usize, on: bool) {
        if let Some(led) = self.0.borrow_mut().leds.get_mut(id) {
            *led = on;
        }
    }
}
