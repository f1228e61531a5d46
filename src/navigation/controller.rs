// src/navigation/controller.rs
// Line-following motion state machine: PD tracking, junction detection and turn execution.
//
// The controller is ticked at the control-loop rate. Commands from the navigator only
// set motors and bookkeeping; every state change after a command happens inside `tick`.

use log::{debug, info, trace};

use crate::config::MotionConfig;
use crate::core::clock::Timestamp;
use crate::hardware::{DriveCapability, LineSensorCapability};

use super::drive::TankDrive;
use super::line_sensor::{LineFrame, LineSensorArray};
use super::map::JunctionCommand;
use super::pd::{LateralError, PdController};

/// Motion controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    /// Motors off
    Rest,
    /// Tracking the line with PD correction
    FollowingLine,
    /// Junction edge seen, crawling forward to centre the wheels on it
    PreJunction,
    /// On the junction, executing or awaiting a turn
    Junction,
}

/// Motion controller driving the wheels from the line sensor array
pub struct MotionController {
    config: MotionConfig,
    drive: TankDrive,
    sensors: LineSensorArray,
    pd: PdController,
    error: LateralError,
    state: MotionState,
    state_changed: bool,
    state_since: Timestamp,
    junction_start: Timestamp,
    turn_start: Timestamp,
    turn_command: Option<JunctionCommand>,
    last_turn_time: Option<Timestamp>,
    reversing: bool,
}

impl MotionController {
    /// Creates a resting controller.
    pub fn new(
        config: &MotionConfig,
        drive: Box<dyn DriveCapability>,
        sensors: Box<dyn LineSensorCapability>,
    ) -> Self {
        MotionController {
            config: config.clone(),
            drive: TankDrive::new(drive, config.left_motor_bias, config.right_motor_bias),
            sensors: LineSensorArray::new(sensors, config.filter_window, config.filter_threshold),
            pd: PdController::new(config.kp, config.ki, config.kd, config.max_pd_correction),
            error: LateralError::new(),
            state: MotionState::Rest,
            state_changed: false,
            state_since: Timestamp::default(),
            junction_start: Timestamp::default(),
            turn_start: Timestamp::default(),
            turn_command: None,
            last_turn_time: None,
            reversing: false,
        }
    }

    /// Current state
    pub fn state(&self) -> MotionState {
        self.state
    }

    /// True after `reverse` until the next `forward`
    pub fn is_reversing(&self) -> bool {
        self.reversing
    }

    /// Turn being executed, if any
    pub fn pending_turn(&self) -> Option<JunctionCommand> {
        self.turn_command
    }

    /// When the last turn was accepted
    pub fn last_turn_time(&self) -> Option<Timestamp> {
        self.last_turn_time
    }

    /// Default drive power
    pub fn speed(&self) -> i32 {
        self.config.robot_speed
    }

    /// Milliseconds since the last state assignment
    pub fn time_in_state(&self, now: Timestamp) -> u32 {
        now.elapsed_since(self.state_since)
    }

    /// Wheels, for inspection
    pub fn drive(&self) -> &TankDrive {
        &self.drive
    }

    fn set_state(&mut self, state: MotionState, now: Timestamp) {
        if state != self.state {
            debug!("Motion: {:?} -> {:?}", self.state, state);
        }
        self.state = state;
        self.state_changed = true;
        self.state_since = now;
    }

    /// Follow the line forwards at the default speed.
    pub fn forward(&mut self, now: Timestamp) {
        self.forward_at(self.config.robot_speed, now);
    }

    /// Follow the line forwards at `power`.
    pub fn forward_at(&mut self, power: i32, now: Timestamp) {
        debug!("Motion: forward {}", power);
        self.set_state(MotionState::FollowingLine, now);
        self.reversing = false;
        self.drive_forward(power);
    }

    /// Follow the line backwards at the default speed.
    pub fn reverse(&mut self, now: Timestamp) {
        self.reverse_at(self.config.robot_speed, now);
    }

    /// Follow the line backwards at `power` with softened gains.
    pub fn reverse_at(&mut self, power: i32, now: Timestamp) {
        debug!("Motion: reverse {}", power);
        self.set_state(MotionState::FollowingLine, now);
        self.reversing = true;
        let scale = self.config.reverse_gain_scale;
        self.pd
            .set_tunings(self.config.kp * scale, self.config.ki, self.config.kd * scale);
        self.drive.reverse(power as f32);
    }

    /// Stop both wheels and rest.
    pub fn stop(&mut self, now: Timestamp) {
        debug!("Motion: stop");
        self.set_state(MotionState::Rest, now);
        self.drive.stop();
    }

    /// Drive both wheels forward at `power` without tracking the line or changing state.
    pub fn creep(&mut self, power: i32) {
        debug!("Motion: creep {}", power);
        self.drive.forward(power as f32);
    }

    fn drive_forward(&mut self, power: i32) {
        self.pd.set_tunings(self.config.kp, self.config.ki, self.config.kd);
        self.drive.forward(power as f32);
    }

    fn begin_turn(&mut self, command: JunctionCommand, now: Timestamp) {
        self.turn_start = now;
        self.turn_command = Some(command);
    }

    /// Spin left at `power`.
    pub fn turn_left(&mut self, power: i32, now: Timestamp) {
        self.begin_turn(JunctionCommand::GoLeft, now);
        self.drive.spin_left(power as f32);
    }

    /// Spin right at `power`.
    pub fn turn_right(&mut self, power: i32, now: Timestamp) {
        self.begin_turn(JunctionCommand::GoRight, now);
        self.drive.spin_right(power as f32);
    }

    /// Drive across the junction at `power`.
    pub fn continue_straight(&mut self, power: i32, now: Timestamp) {
        self.begin_turn(JunctionCommand::GoStraight, now);
        self.drive_forward(power);
    }

    /// Half turn at `power`; `opposite` spins clockwise instead of anticlockwise.
    pub fn u_turn(&mut self, power: i32, opposite: bool, now: Timestamp) {
        self.begin_turn(JunctionCommand::UTurn, now);
        if opposite {
            self.drive.spin_right(power as f32);
        } else {
            self.drive.spin_left(power as f32);
        }
    }

    /// Start `command` at the default speed.
    pub fn execute(&mut self, command: JunctionCommand, opposite: bool, now: Timestamp) {
        let power = self.config.robot_speed;
        match command {
            JunctionCommand::GoLeft => self.turn_left(power, now),
            JunctionCommand::GoRight => self.turn_right(power, now),
            JunctionCommand::GoStraight => self.continue_straight(power, now),
            JunctionCommand::UTurn => self.u_turn(power, opposite, now),
        }
    }

    /// Watch for the end of a turn issued while resting.
    pub fn enter_junction(&mut self, now: Timestamp) {
        self.set_state(MotionState::Junction, now);
    }

    /// One control-loop step.
    pub fn tick(&mut self, now: Timestamp) {
        if self.state_changed {
            self.pd.reset();
            self.state_changed = false;
        }
        if self.state == MotionState::Rest {
            return;
        }

        let frame = self.sensors.read();
        let (outer_latched, inner_latched) = self.sensors.rising_edge();
        match self.state {
            MotionState::FollowingLine => self.follow_line(frame, outer_latched, now),
            MotionState::PreJunction => {
                let multiplier = if self.reversing {
                    self.config.reverse_grace_multiplier
                } else {
                    1.0
                };
                let elapsed = now.elapsed_since(self.junction_start) as f32;
                if elapsed > self.config.junction_forward_ms as f32 * multiplier {
                    debug!("Motion: crawl done after {} ms {:?}", elapsed, frame);
                    self.set_state(MotionState::Junction, now);
                }
            }
            MotionState::Junction => self.detect_line(frame, inner_latched, now),
            MotionState::Rest => {}
        }
        // Latch last so a single-tick edge is seen by the next tick.
        self.sensors.update_rising_edge();
    }

    fn follow_line(&mut self, frame: LineFrame, outer_latched: bool, now: Timestamp) {
        if frame.any_outer() && !outer_latched {
            info!("Motion: junction detected {:?}", frame);
            self.junction_start = now;
            self.set_state(MotionState::PreJunction, now);
            self.drive_forward(self.config.robot_speed);
            return;
        }
        let error = self.error.update(&frame);
        let correction = self.pd.next(error, now);
        trace!("Motion: frame {:?} error {} correction {}", frame, error, correction);
        self.drive.correct(correction);
    }

    fn detect_line(&mut self, frame: LineFrame, inner_latched: bool, now: Timestamp) {
        let Some(command) = self.turn_command else {
            return;
        };
        let grace = match command {
            JunctionCommand::GoStraight => self.config.straight_grace_ms,
            _ => self.config.turn_grace_ms,
        };
        let elapsed = now.elapsed_since(self.turn_start);
        if elapsed < grace {
            return;
        }

        let centred = match command {
            JunctionCommand::GoStraight => frame.inner_left || frame.inner_right,
            _ => frame.both_inner() && !inner_latched,
        };
        if !centred {
            return;
        }
        if command == JunctionCommand::UTurn
            && (elapsed as f32) < self.config.turn_grace_ms as f32 * self.config.u_turn_grace_multiplier
        {
            return;
        }

        info!("Motion: {:?} complete after {} ms", command, elapsed);
        self.last_turn_time = Some(now);
        self.turn_command = None;
        self.set_state(MotionState::FollowingLine, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{Bench, Direction, MockDriveCapability, MotorId};
    use mockall::predicate::eq;
    use rstest::{fixture, rstest};

    const CENTRED: [bool; 4] = [false, true, true, false];
    const CROSSING: [bool; 4] = [true, true, true, true];
    const OFF: [bool; 4] = [false; 4];

    fn t(ms: u32) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    fn config() -> MotionConfig {
        MotionConfig {
            filter_window: 1,
            ..MotionConfig::default()
        }
    }

    #[fixture]
    fn rig() -> (Bench, MotionController) {
        let bench = Bench::new();
        let motion = MotionController::new(
            &config(),
            Box::new(bench.drive()),
            Box::new(bench.line_sensors()),
        );
        (bench, motion)
    }

    /// Drives onto a junction and returns the time the crawl finished.
    fn reach_junction(bench: &Bench, motion: &mut MotionController) -> u32 {
        bench.set_line(CENTRED);
        motion.forward(t(0));
        motion.tick(t(5));
        bench.set_line(CROSSING);
        motion.tick(t(10));
        assert_eq!(motion.state(), MotionState::PreJunction);
        motion.tick(t(200));
        assert_eq!(motion.state(), MotionState::Junction);
        200
    }

    #[rstest]
    fn rest_ignores_ticks(rig: (Bench, MotionController)) {
        let (bench, mut motion) = rig;
        bench.set_line(CROSSING);
        motion.tick(t(5));
        assert_eq!(motion.state(), MotionState::Rest);
        assert_eq!(bench.drive_log_len(), 0);
    }

    #[rstest]
    fn forward_drives_both_wheels(rig: (Bench, MotionController)) {
        let (bench, mut motion) = rig;
        motion.forward(t(0));
        assert_eq!(motion.state(), MotionState::FollowingLine);
        assert_eq!(bench.motor(MotorId::Left), Some((Direction::Forward, 62258)));
        assert_eq!(bench.motor(MotorId::Right), Some((Direction::Forward, 62258)));
    }

    #[rstest]
    fn line_to_the_right_speeds_left_wheel(rig: (Bench, MotionController)) {
        let (bench, mut motion) = rig;
        bench.set_line([false, false, true, false]);
        motion.forward(t(0));
        motion.tick(t(5));
        assert_eq!(motion.state(), MotionState::FollowingLine);
        assert!(motion.drive().left().power() > motion.drive().right().power());
        let (_, left) = bench.motor(MotorId::Left).unwrap();
        let (_, right) = bench.motor(MotorId::Right).unwrap();
        assert!(left > right);
    }

    #[rstest]
    fn latched_outer_edge_is_not_a_new_junction(rig: (Bench, MotionController)) {
        let (bench, mut motion) = rig;
        bench.set_line(CROSSING);
        motion.forward(t(0));
        motion.tick(t(5));
        assert_eq!(motion.state(), MotionState::PreJunction);

        // Back on the line after the turn: the outer sensors are still latched.
        motion.forward(t(10));
        motion.tick(t(15));
        assert_eq!(motion.state(), MotionState::FollowingLine);
    }

    #[rstest]
    fn junction_without_command_holds(rig: (Bench, MotionController)) {
        let (bench, mut motion) = rig;
        let at = reach_junction(&bench, &mut motion);
        bench.set_line(CENTRED);
        motion.tick(t(at + 1_000));
        assert_eq!(motion.state(), MotionState::Junction);
    }

    #[rstest]
    fn left_turn_waits_for_grace_and_fresh_centre(rig: (Bench, MotionController)) {
        let (bench, mut motion) = rig;
        let at = reach_junction(&bench, &mut motion);
        motion.turn_left(95, t(at));
        assert_eq!(bench.motor(MotorId::Left).map(|m| m.0), Some(Direction::Reverse));
        assert_eq!(bench.motor(MotorId::Right).map(|m| m.0), Some(Direction::Forward));

        bench.set_line(CENTRED);
        motion.tick(t(at + 100));
        assert_eq!(motion.state(), MotionState::Junction, "inside grace");

        bench.set_line(OFF);
        motion.tick(t(at + 460));
        assert_eq!(motion.state(), MotionState::Junction);

        bench.set_line(CENTRED);
        motion.tick(t(at + 470));
        assert_eq!(motion.state(), MotionState::FollowingLine);
        assert_eq!(motion.pending_turn(), None);
        assert_eq!(motion.last_turn_time(), Some(t(at + 470)));
    }

    #[rstest]
    fn straight_accepts_either_inner_sensor(rig: (Bench, MotionController)) {
        let (bench, mut motion) = rig;
        let at = reach_junction(&bench, &mut motion);
        motion.continue_straight(95, t(at));
        bench.set_line([false, true, false, false]);
        motion.tick(t(at + 100));
        assert_eq!(motion.state(), MotionState::Junction);
        motion.tick(t(at + 160));
        assert_eq!(motion.state(), MotionState::FollowingLine);
    }

    #[rstest]
    fn u_turn_needs_extended_grace(rig: (Bench, MotionController)) {
        let (bench, mut motion) = rig;
        let at = reach_junction(&bench, &mut motion);
        motion.u_turn(95, true, t(at));
        assert_eq!(bench.motor(MotorId::Left).map(|m| m.0), Some(Direction::Forward));

        bench.set_line(OFF);
        motion.tick(t(at + 400));
        bench.set_line(CENTRED);
        motion.tick(t(at + 500));
        assert_eq!(motion.state(), MotionState::Junction, "branch line passed mid-spin");

        bench.set_line(OFF);
        motion.tick(t(at + 1_000));
        bench.set_line(CENTRED);
        motion.tick(t(at + 1_200));
        assert_eq!(motion.state(), MotionState::FollowingLine);
    }

    #[rstest]
    fn reversing_extends_the_crawl(rig: (Bench, MotionController)) {
        let (bench, mut motion) = rig;
        bench.set_line(CENTRED);
        motion.reverse(t(0));
        assert!(motion.is_reversing());
        motion.tick(t(5));
        bench.set_line(CROSSING);
        motion.tick(t(10));
        assert_eq!(motion.state(), MotionState::PreJunction);
        assert_eq!(bench.motor(MotorId::Left).map(|m| m.0), Some(Direction::Forward));

        motion.tick(t(160));
        assert_eq!(motion.state(), MotionState::PreJunction);
        motion.tick(t(180));
        assert_eq!(motion.state(), MotionState::Junction);
    }

    #[rstest]
    fn time_in_state_tracks_assignments(rig: (Bench, MotionController)) {
        let (_bench, mut motion) = rig;
        motion.forward(t(100));
        assert_eq!(motion.time_in_state(t(350)), 250);
        motion.stop(t(400));
        assert_eq!(motion.time_in_state(t(450)), 50);
        assert_eq!(motion.state(), MotionState::Rest);
    }

    #[test]
    fn stop_zeroes_both_motors() {
        let mut drive = MockDriveCapability::new();
        for motor in [MotorId::Left, MotorId::Right] {
            drive
                .expect_set()
                .with(eq(motor), eq(Direction::Forward), eq(0))
                .times(1)
                .return_const(());
        }
        let bench = Bench::new();
        let mut motion = MotionController::new(&config(), Box::new(drive), Box::new(bench.line_sensors()));
        motion.stop(t(0));
    }
}
