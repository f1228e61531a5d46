// core/mission.rs

// Top-level mission: shuttle reels from the pickup bays to the dropoff zone matching
// their type until the run time is used up or every bay has been visited twice, then
// park in the start box. One cooperative pass per control tick; nothing here blocks.

// Dependencies
use log::{error, info, warn};
use crate::config::MissionConfig;
use crate::core::clock::Timestamp;
use crate::core::memory::PickupBayRegistry;
use crate::core::panel::IndicatorPanel;
use crate::core::state::{MissionFault, MissionState};
use crate::grabber::{GrabberController, GrabberState, Reel, ServoPosition};
use crate::navigation::{DropoffState, NavigationError, Navigator, PathFollowingState, RouteError};

impl From<&NavigationError> for MissionFault {
    fn from(err: &NavigationError) -> Self {
        match err {
            NavigationError::Route(e) => MissionFault::NoRoute(e.to_string()),
            NavigationError::Stalled { .. } => MissionFault::Stalled(err.to_string()),
            NavigationError::OffMap { .. } => MissionFault::OffMap(err.to_string()),
        }
    }
}

// Mission state machine owning navigation, the grabber and the indicator panel
pub struct MissionController {
    config: MissionConfig,
    navigator: Navigator,
    grabber: GrabberController,
    registry: PickupBayRegistry,
    panel: IndicatorPanel,
    state: MissionState,
    run_start: Option<Timestamp>,        // Set when the operator starts the run
    drop_time: Option<Timestamp>,        // Last dropoff, for the lifter grace
    end_creep_start: Option<Timestamp>,  // Final creep into the start box
    end_drop_node: Option<String>,       // Last bay of the current reel's zone
}

impl MissionController {
    pub fn new(
        config: &MissionConfig,
        navigator: Navigator,
        grabber: GrabberController,
        panel: IndicatorPanel,
    ) -> Self {
        let registry = PickupBayRegistry::new(navigator.router().map().pickup_bays());
        MissionController {
            config: config.clone(),
            navigator,
            grabber,
            registry,
            panel,
            state: MissionState::Rest,
            run_start: None,
            drop_time: None,
            end_creep_start: None,
            end_drop_node: None,
        }
    }

    pub fn state(&self) -> &MissionState {
        &self.state
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn navigator_mut(&mut self) -> &mut Navigator {
        &mut self.navigator
    }

    pub fn grabber(&self) -> &GrabberController {
        &self.grabber
    }

    pub fn registry(&self) -> &PickupBayRegistry {
        &self.registry
    }

    /// True between `start` and a terminal state
    pub fn is_running(&self) -> bool {
        self.run_start.is_some() && !self.state.is_terminal()
    }

    /// Begin the run; the first pass leaves for the first pickup bay
    pub fn start(&mut self, now: Timestamp) {
        if self.run_start.is_some() {
            return;
        }
        info!("Mission: run started");
        self.run_start = Some(now);
    }

    /// Stop the run where it is
    pub fn abort(&mut self, now: Timestamp) {
        warn!("Mission: aborted in {:?}", self.state);
        self.navigator.motion_mut().stop(now);
        self.panel.off();
        self.state = MissionState::Finished;
    }

    /// One cooperative mission pass
    pub fn tick(&mut self, now: Timestamp) {
        if self.run_start.is_none() || self.state.is_terminal() {
            return;
        }
        if let Err(err) = self.step(now) {
            let fault = MissionFault::from(&err);
            error!("Mission: fault in {:?}: {}", self.state, fault);
            self.navigator.motion_mut().stop(now);
            self.panel.off();
            self.state = MissionState::Fault(fault);
        }
    }

    fn step(&mut self, now: Timestamp) -> Result<(), NavigationError> {
        match self.state {
            MissionState::Rest => {
                let first = self.config.first_pickup.clone();
                info!("Mission: leaving for first pickup {}", first);
                self.registry.mark_used(&first);
                self.navigator.set_route(&first, None, None, now)?;
                self.state = MissionState::MovingToPickup;
            }
            MissionState::MovingToPickup => {
                self.panel.strobe(now);
                self.navigator.tick_path(now)?;
                self.lower_lifter_after_grace(now);
                if self.navigator.path_state() == PathFollowingState::Complete {
                    info!("Mission: at pickup bay {}", self.navigator.current_node());
                    self.state = MissionState::PickingUp;
                }
            }
            MissionState::PickingUp => {
                self.grabber.tick(now);
                match self.grabber.state() {
                    GrabberState::Rest => {
                        self.grabber.pickup();
                        self.panel.flash(now);
                    }
                    GrabberState::PickedUp => self.leave_for_zone(now)?,
                    _ => {}
                }
            }
            MissionState::MovingToDropoff => {
                self.navigator.tick_path(now)?;
                if self.navigator.path_state() == PathFollowingState::Complete {
                    let end = self
                        .end_drop_node
                        .clone()
                        .unwrap_or_else(|| self.navigator.current_node().to_string());
                    info!("Mission: at zone entry, searching up to {}", end);
                    self.navigator.start_dropoff(&end);
                    self.grabber.raise_lifter(now);
                    self.state = MissionState::MovingToDropoffBay;
                }
            }
            MissionState::MovingToDropoffBay => {
                self.navigator.tick_dropoff(now)?;
                if self.navigator.dropoff_state() == DropoffState::Complete {
                    info!("Mission: at dropoff bay {}", self.navigator.current_node());
                    self.state = MissionState::DroppingOff;
                }
            }
            MissionState::DroppingOff => {
                self.grabber.tick(now);
                match self.grabber.state() {
                    GrabberState::Rest => {
                        self.grabber.dropoff();
                        self.panel.flash(now);
                    }
                    GrabberState::DroppedOff => self.leave_dropoff(now)?,
                    _ => {}
                }
            }
            MissionState::EndingRun => {
                self.panel.flash(now);
                match self.end_creep_start {
                    None => {
                        self.navigator.tick_path(now)?;
                        if self.navigator.path_state() == PathFollowingState::Complete {
                            info!("Mission: home, creeping into the start box");
                            self.navigator.motion_mut().creep(self.config.end_forward_power);
                            self.end_creep_start = Some(now);
                        }
                    }
                    Some(start) if now.elapsed_since(start) > self.config.end_forward_ms => {
                        self.navigator.motion_mut().stop(now);
                        self.panel.off();
                        info!("Mission: parked, run finished");
                        self.state = MissionState::Finished;
                    }
                    Some(_) => {}
                }
            }
            MissionState::Finished | MissionState::Fault(_) => {}
        }
        Ok(())
    }

    fn lower_lifter_after_grace(&mut self, now: Timestamp) {
        if self.grabber.lifter().position() == Some(ServoPosition::LifterDown) {
            return;
        }
        if let Some(dropped) = self.drop_time {
            if now.elapsed_since(dropped) < self.config.lifter_reset_grace_ms {
                return;
            }
        }
        info!("Mission: lowering lifter");
        self.grabber.lower_lifter(now);
        self.drop_time = None;
    }

    fn leave_for_zone(&mut self, now: Timestamp) -> Result<(), NavigationError> {
        let reel = match self.grabber.reel() {
            Some(reel) if reel.index().is_some() => reel,
            other => {
                warn!("Mission: reel {:?} unusable, delivering as reel 0", other);
                Reel::Reel0
            }
        };
        self.panel.show_reel(reel);

        let zone = self
            .navigator
            .router()
            .map()
            .reel_zone(reel)
            .cloned()
            .ok_or_else(|| RouteError::UnknownNode(format!("{:?} dropoff zone", reel)))?;
        info!("Mission: carrying {:?} to {}..{}", reel, zone.entry, zone.end);
        self.navigator.set_route(&zone.entry, None, None, now)?;
        self.end_drop_node = Some(zone.end);
        self.grabber.reset();
        self.state = MissionState::MovingToDropoff;
        Ok(())
    }

    fn leave_dropoff(&mut self, now: Timestamp) -> Result<(), NavigationError> {
        self.panel.off();
        self.grabber.reset();
        self.end_drop_node = None;

        let elapsed = self.run_start.map_or(0, |start| now.elapsed_since(start));
        if elapsed > self.config.run_time_ms {
            info!("Mission: out of time after {} ms, going home", elapsed);
            return self.go_home(now);
        }

        let navigator = &self.navigator;
        match self.registry.claim_nearest(|bay| navigator.hop_count(bay)) {
            Some(bay) => {
                info!("Mission: next pickup {}", bay);
                self.navigator.set_route(&bay, None, None, now)?;
                self.drop_time = Some(now);
                self.state = MissionState::MovingToPickup;
                Ok(())
            }
            None => {
                info!("Mission: every pickup bay visited, going home");
                self.go_home(now)
            }
        }
    }

    fn go_home(&mut self, now: Timestamp) -> Result<(), NavigationError> {
        let home = self.config.home_node.clone();
        self.navigator.set_route(&home, None, None, now)?;
        self.end_creep_start = None;
        self.state = MissionState::EndingRun;
        Ok(())
    }
}
