//! Grabber for the AGV
//!
//! Sequences the jaw and lifter servos to pick up and release reels, and identifies
//! each reel by resistance while lifting it.

pub mod resistance;
pub mod servo;

use log::{debug, info};

use crate::config::{GrabberConfig, ResistanceConfig, ServoCalibration};
use crate::core::clock::Timestamp;
use crate::hardware::{ResistanceAdcCapability, ServoCapability, ServoId};

pub use resistance::{Reel, ResistanceClassifier, ResistanceState};
pub use servo::{ServoPosition, ServoState, ServoUnit};

/// Grabber states. `PickedUp` and `DroppedOff` hold until `reset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabberState {
    Rest,
    PickingUp,
    PickedUp,
    DroppingOff,
    DroppedOff,
}

/// Progress through a pickup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickupStep {
    None,
    ClosingJaw,
    RaisingLifter,
}

/// Progress through a dropoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropoffStep {
    None,
    OpeningJaw,
}

/// Jaw and lifter sequencing
pub struct GrabberController {
    servos: Box<dyn ServoCapability>,
    calibration: ServoCalibration,
    jaw: ServoUnit,
    lifter: ServoUnit,
    classifier: ResistanceClassifier,
    state: GrabberState,
    pickup_step: PickupStep,
    dropoff_step: DropoffStep,
    reel: Option<Reel>,
}

impl GrabberController {
    /// Creates the grabber and parks it with the jaw open and the lifter down.
    pub fn new(
        config: &GrabberConfig,
        resistance: &ResistanceConfig,
        servos: Box<dyn ServoCapability>,
        adc: Box<dyn ResistanceAdcCapability>,
        now: Timestamp,
    ) -> Self {
        let mut grabber = GrabberController {
            servos,
            calibration: config.calibration.clone(),
            jaw: ServoUnit::new(ServoId::Jaw, config.servo_settle_ms),
            lifter: ServoUnit::new(ServoId::Lifter, config.servo_settle_ms),
            classifier: ResistanceClassifier::new(resistance, adc),
            state: GrabberState::Rest,
            pickup_step: PickupStep::None,
            dropoff_step: DropoffStep::None,
            reel: None,
        };
        grabber.move_jaw(ServoPosition::JawOpen, true, now);
        grabber.move_lifter(ServoPosition::LifterDown, true, now);
        grabber
    }

    pub fn state(&self) -> GrabberState {
        self.state
    }

    /// Reel identified by the last pickup
    pub fn reel(&self) -> Option<Reel> {
        self.reel
    }

    pub fn jaw(&self) -> &ServoUnit {
        &self.jaw
    }

    pub fn lifter(&self) -> &ServoUnit {
        &self.lifter
    }

    /// Start a pickup. The robot must be stopped and aligned at a pickup bay.
    pub fn pickup(&mut self) {
        info!("Grabber: picking up reel");
        self.state = GrabberState::PickingUp;
    }

    /// Start a dropoff. The robot must be stopped and aligned in a dropoff bay.
    pub fn dropoff(&mut self) {
        info!("Grabber: dropping off reel");
        self.state = GrabberState::DroppingOff;
    }

    /// Acknowledge a finished sequence, or abandon one in progress.
    pub fn reset(&mut self) {
        debug!("Grabber: reset");
        self.state = GrabberState::Rest;
        self.pickup_step = PickupStep::None;
        self.dropoff_step = DropoffStep::None;
        self.classifier.reset();
    }

    /// Raise the lifter clear of the floor without affecting the sequence.
    pub fn raise_lifter(&mut self, now: Timestamp) {
        self.move_lifter(ServoPosition::LifterUp, true, now);
    }

    /// Lower the lifter ready for the next pickup without affecting the sequence.
    pub fn lower_lifter(&mut self, now: Timestamp) {
        self.move_lifter(ServoPosition::LifterDown, true, now);
    }

    fn move_jaw(&mut self, position: ServoPosition, manual: bool, now: Timestamp) {
        self.jaw
            .set_position(self.servos.as_mut(), &self.calibration, position, manual, now);
    }

    fn move_lifter(&mut self, position: ServoPosition, manual: bool, now: Timestamp) {
        self.lifter
            .set_position(self.servos.as_mut(), &self.calibration, position, manual, now);
    }

    pub fn tick(&mut self, now: Timestamp) {
        if self.state == GrabberState::Rest {
            return;
        }
        self.jaw.tick(now);
        self.lifter.tick(now);

        match self.state {
            GrabberState::PickingUp => self.tick_pickup(now),
            GrabberState::DroppingOff => self.tick_dropoff(now),
            GrabberState::Rest | GrabberState::PickedUp | GrabberState::DroppedOff => {}
        }
    }

    fn tick_pickup(&mut self, now: Timestamp) {
        match self.pickup_step {
            PickupStep::None => {
                self.pickup_step = PickupStep::ClosingJaw;
                self.move_jaw(ServoPosition::JawClosed, false, now);
            }
            PickupStep::ClosingJaw => {
                if self.jaw.state() == ServoState::InPosition {
                    self.classifier.start_sense();
                    self.pickup_step = PickupStep::RaisingLifter;
                    self.move_lifter(ServoPosition::LifterMid, false, now);
                }
            }
            PickupStep::RaisingLifter => {
                self.classifier.tick();
                if self.lifter.state() == ServoState::InPosition
                    && self.classifier.state() == ResistanceState::Detected
                {
                    self.reel = self.classifier.reel();
                    info!("Grabber: picked up {:?}", self.reel);
                    self.classifier.reset();
                    self.state = GrabberState::PickedUp;
                    self.pickup_step = PickupStep::None;
                }
            }
        }
    }

    fn tick_dropoff(&mut self, now: Timestamp) {
        match self.dropoff_step {
            DropoffStep::None => {
                self.dropoff_step = DropoffStep::OpeningJaw;
                self.move_jaw(ServoPosition::JawOpen, false, now);
            }
            DropoffStep::OpeningJaw => {
                if self.jaw.state() == ServoState::InPosition {
                    info!("Grabber: reel released");
                    self.state = GrabberState::DroppedOff;
                    self.dropoff_step = DropoffStep::None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::Bench;

    fn t(ms: u32) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    fn grabber(bench: &Bench) -> GrabberController {
        GrabberController::new(
            &GrabberConfig::default(),
            &ResistanceConfig::default(),
            Box::new(bench.servos()),
            Box::new(bench.adc()),
            t(0),
        )
    }

    #[test]
    fn parks_open_and_down() {
        let bench = Bench::new();
        let grabber = grabber(&bench);
        assert_eq!(bench.servo(ServoId::Jaw), Some(1700));
        assert_eq!(bench.servo(ServoId::Lifter), Some(1300));
        assert_eq!(grabber.jaw().state(), ServoState::Rest);
    }

    #[test]
    fn pickup_classifies_while_lifting() {
        let bench = Bench::new();
        bench.set_resistance(50_000);
        let mut grabber = grabber(&bench);
        grabber.pickup();

        grabber.tick(t(10));
        assert_eq!(bench.servo(ServoId::Jaw), Some(1350));
        grabber.tick(t(300));
        assert_eq!(grabber.state(), GrabberState::PickingUp);

        // Jaw settles, lifter goes to mid and sensing starts.
        grabber.tick(t(520));
        assert_eq!(bench.servo(ServoId::Lifter), Some(1450));

        let mut now = 520;
        while grabber.state() == GrabberState::PickingUp && now < 5_000 {
            now += 20;
            grabber.tick(t(now));
        }
        assert_eq!(grabber.state(), GrabberState::PickedUp);
        assert_eq!(grabber.reel(), Some(Reel::Reel3));
        assert!(now > 1_020, "lifter settle time respected");

        grabber.reset();
        assert_eq!(grabber.state(), GrabberState::Rest);
    }

    #[test]
    fn dropoff_opens_jaw() {
        let bench = Bench::new();
        let mut grabber = grabber(&bench);
        grabber.dropoff();
        grabber.tick(t(10));
        assert_eq!(grabber.state(), GrabberState::DroppingOff);
        grabber.tick(t(511));
        assert_eq!(grabber.state(), GrabberState::DroppedOff);
        assert_eq!(bench.servo(ServoId::Jaw), Some(1700));
    }

    #[test]
    fn manual_lifter_moves() {
        let bench = Bench::new();
        let mut grabber = grabber(&bench);
        grabber.raise_lifter(t(5));
        assert_eq!(bench.servo(ServoId::Lifter), Some(1550));
        grabber.lower_lifter(t(10));
        assert_eq!(bench.servo(ServoId::Lifter), Some(1300));
        assert_eq!(grabber.state(), GrabberState::Rest);
    }
}
