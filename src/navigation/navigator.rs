// src/navigation/navigator.rs
// Route execution and dropoff-bay search on top of the motion controller.
//
// The navigator never waits: every tick it looks at the motion state and decides
// whether the next route step, bay check or turn is due.

use log::{debug, error, info, warn};
use thiserror::Error;

use crate::config::NavigationConfig;
use crate::core::clock::Timestamp;
use crate::core::memory::DeliveredBaySet;
use crate::core::perception::{sensor_side_for, BayOccupancySampler, OccupancyState};

use super::controller::{MotionController, MotionState};
use super::map::{JunctionCommand, Orientation};
use super::planner::{Directions, GraphRouter, Route, RouteError};

/// Navigation failures surfaced to the mission
#[derive(Debug, Error)]
pub enum NavigationError {
    /// Route request could not be satisfied
    #[error(transparent)]
    Route(#[from] RouteError),
    /// Motion did not change state within the watchdog timeout
    #[error("motion stuck in {state:?} for {elapsed_ms} ms")]
    Stalled {
        /// State motion was stuck in
        state: MotionState,
        /// Time spent in that state
        elapsed_ms: u32,
    },
    /// Position tracking followed an edge that does not exist
    #[error("no edge {heading} from {node}")]
    OffMap {
        /// Node being left
        node: String,
        /// Heading with no edge
        heading: Orientation,
    },
}

/// Route following states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathFollowingState {
    Rest,
    Navigating,
    Turning,
    Complete,
}

/// Dropoff bay search states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropoffState {
    Rest,
    FindingBay,
    TurnPending,
    Turning,
    DroppingOff,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    FollowingPath,
    Dropoff,
}

/// Route executor and bay finder
pub struct Navigator {
    config: NavigationConfig,
    router: GraphRouter,
    motion: MotionController,
    sampler: BayOccupancySampler,
    delivered: DeliveredBaySet,
    mode: Mode,
    path_state: PathFollowingState,
    dropoff_state: DropoffState,
    route: Route,
    start_node: String,
    current_node: String,
    current_orientation: Orientation,
    dropoff_initial: bool,
    bay_occupied: bool,
    skipping_bay: bool,
    end_drop_node: Option<String>,
    dropoff_start: Timestamp,
}

impl Navigator {
    /// Creates a navigator positioned at the configured start node.
    pub fn new(
        config: &NavigationConfig,
        router: GraphRouter,
        motion: MotionController,
        sampler: BayOccupancySampler,
    ) -> Self {
        Navigator {
            config: config.clone(),
            router,
            motion,
            sampler,
            delivered: DeliveredBaySet::new(),
            mode: Mode::FollowingPath,
            path_state: PathFollowingState::Rest,
            dropoff_state: DropoffState::Rest,
            route: Route::default(),
            start_node: config.start_node.clone(),
            current_node: config.start_node.clone(),
            current_orientation: config.start_orientation,
            dropoff_initial: false,
            bay_occupied: false,
            skipping_bay: false,
            end_drop_node: None,
            dropoff_start: Timestamp::default(),
        }
    }

    pub fn motion(&self) -> &MotionController {
        &self.motion
    }

    pub fn motion_mut(&mut self) -> &mut MotionController {
        &mut self.motion
    }

    pub fn router(&self) -> &GraphRouter {
        &self.router
    }

    pub fn path_state(&self) -> PathFollowingState {
        self.path_state
    }

    pub fn dropoff_state(&self) -> DropoffState {
        self.dropoff_state
    }

    /// Node the robot is at, or is heading to while a route runs
    pub fn current_node(&self) -> &str {
        &self.current_node
    }

    pub fn current_orientation(&self) -> Orientation {
        self.current_orientation
    }

    /// Bays that already hold a reel
    pub fn delivered(&self) -> &DeliveredBaySet {
        &self.delivered
    }

    /// Overwrite the tracked position.
    pub fn place(&mut self, node: &str, orientation: Orientation) {
        self.current_node = node.to_string();
        self.current_orientation = orientation;
    }

    pub fn get_directions(
        &self,
        start: &str,
        dest: &str,
        orientation: Orientation,
    ) -> Result<Directions, RouteError> {
        self.router.get_directions(start, dest, orientation)
    }

    /// Nodes visited going from the current node to `dest`
    pub fn hop_count(&self, dest: &str) -> Result<usize, RouteError> {
        self.router.hop_count(&self.current_node, dest)
    }

    /// Plan a route to `dest` and start driving it.
    ///
    /// Start and orientation default to the tracked position. The robot reverses out of
    /// pickup and dropoff bays and drives forwards everywhere else.
    pub fn set_route(
        &mut self,
        dest: &str,
        start: Option<&str>,
        orientation: Option<Orientation>,
        now: Timestamp,
    ) -> Result<(), NavigationError> {
        let start = start.unwrap_or(self.current_node.as_str()).to_string();
        let orientation = orientation.unwrap_or(self.current_orientation);
        info!("Navigation: route {} -> {} facing {}", start, dest, orientation);

        let directions = self
            .router
            .get_directions(&start, dest, orientation)
            .map_err(|e| {
                error!("Navigation: {}", e);
                e
            })?;
        debug!(
            "Navigation: path {:?} commands {:?}",
            directions.nodes, directions.commands
        );

        self.mode = Mode::FollowingPath;
        self.path_state = PathFollowingState::Navigating;
        self.current_node = dest.to_string();
        self.current_orientation = directions.final_orientation;
        self.route = directions.into_route();

        if start.starts_with(['D', 'P']) {
            self.motion.reverse(now);
        } else {
            self.motion.forward(now);
        }
        self.start_node = start;
        Ok(())
    }

    /// Start searching for a free bay, ending at `end_drop_node` at the latest.
    pub fn start_dropoff(&mut self, end_drop_node: &str) {
        info!("Navigation: searching for a bay up to {}", end_drop_node);
        self.mode = Mode::Dropoff;
        self.dropoff_state = DropoffState::FindingBay;
        self.dropoff_initial = true;
        self.skipping_bay = false;
        self.end_drop_node = Some(end_drop_node.to_string());
    }

    /// Advance whichever state machine is active.
    pub fn tick(&mut self, now: Timestamp) -> Result<(), NavigationError> {
        match self.mode {
            Mode::FollowingPath => self.tick_path(now),
            Mode::Dropoff => self.tick_dropoff(now),
        }
    }

    fn check_stall(&self, now: Timestamp) -> Result<(), NavigationError> {
        let Some(limit) = self.config.stall_timeout_ms else {
            return Ok(());
        };
        let elapsed_ms = self.motion.time_in_state(now);
        if elapsed_ms > limit {
            error!(
                "Navigation: motion stuck in {:?} for {} ms",
                self.motion.state(),
                elapsed_ms
            );
            return Err(NavigationError::Stalled {
                state: self.motion.state(),
                elapsed_ms,
            });
        }
        Ok(())
    }

    /// Route following step.
    pub fn tick_path(&mut self, now: Timestamp) -> Result<(), NavigationError> {
        match self.path_state {
            PathFollowingState::Navigating => {
                if self.motion.state() != MotionState::Junction {
                    return self.check_stall(now);
                }
                let Some(step) = self.route.next_step() else {
                    info!("Navigation: route complete at {}", self.current_node);
                    self.path_state = PathFollowingState::Complete;
                    self.motion.stop(now);
                    return Ok(());
                };
                let opposite = step.command == JunctionCommand::UTurn
                    && self.config.opposite_u_turn_nodes.contains(&self.start_node);
                info!("Navigation: {:?} towards {}", step.command, step.node);
                self.motion.execute(step.command, opposite, now);
                self.path_state = PathFollowingState::Turning;
            }
            PathFollowingState::Turning => {
                if self.motion.state() != MotionState::FollowingLine {
                    return self.check_stall(now);
                }
                debug!("Navigation: turn complete");
                self.path_state = PathFollowingState::Navigating;
                self.motion.forward(now);
            }
            PathFollowingState::Rest | PathFollowingState::Complete => {}
        }
        Ok(())
    }

    /// Dropoff search step.
    pub fn tick_dropoff(&mut self, now: Timestamp) -> Result<(), NavigationError> {
        match self.dropoff_state {
            DropoffState::FindingBay => {
                let sampling = self.sampler.state() != OccupancyState::Rest;
                if !(self.dropoff_initial
                    || sampling
                    || self.motion.state() == MotionState::PreJunction)
                {
                    return self.check_stall(now);
                }
                if !self.check_bay() {
                    return Ok(());
                }
                debug!("Navigation: bay at {} occupied {}", self.current_node, self.bay_occupied);
                self.dropoff_state = DropoffState::TurnPending;
            }
            DropoffState::TurnPending => {
                if !(self.dropoff_initial || self.motion.state() == MotionState::Junction) {
                    return self.check_stall(now);
                }
                self.dropoff_initial = false;
                let command = self.choose_bay_command();
                let next = self
                    .router
                    .map()
                    .neighbor(&self.current_node, self.current_orientation)
                    .ok_or_else(|| NavigationError::OffMap {
                        node: self.current_node.clone(),
                        heading: self.current_orientation,
                    })?
                    .to_string();
                info!("Navigation: {:?} at {}, next node {}", command, self.current_node, next);
                self.current_node = next;
                self.dropoff_state = DropoffState::Turning;
                self.motion.execute(command, false, now);
            }
            DropoffState::Turning => {
                if self.motion.state() == MotionState::Rest {
                    self.motion.enter_junction(now);
                }
                if self.motion.state() != MotionState::FollowingLine {
                    return self.check_stall(now);
                }
                self.motion.forward_at(self.config.dropoff_creep_power, now);
                self.dropoff_state = if self.skipping_bay {
                    DropoffState::FindingBay
                } else {
                    DropoffState::DroppingOff
                };
                self.skipping_bay = false;
                self.dropoff_start = now;
            }
            DropoffState::DroppingOff => {
                if now.elapsed_since(self.dropoff_start) > self.config.dropoff_forward_ms {
                    info!("Navigation: in position at {}", self.current_node);
                    self.motion.stop(now);
                    self.end_drop_node = None;
                    self.dropoff_state = DropoffState::Complete;
                }
            }
            DropoffState::Rest | DropoffState::Complete => {}
        }
        Ok(())
    }

    // Decide whether the bay beside the current junction is occupied.
    // Returns false while the sampler is still collecting.
    fn check_bay(&mut self) -> bool {
        if self.end_drop_node.as_deref() == Some(self.current_node.as_str()) {
            // The carried reel hides the last bay from the sensors.
            self.bay_occupied = false;
            return true;
        }
        if self.delivered.contains(&self.current_node) {
            self.bay_occupied = true;
            return true;
        }

        let side = sensor_side_for(&self.current_node);
        if self.sampler.state() == OccupancyState::Rest {
            debug!("Navigation: sampling {:?} sensor at {}", side, self.current_node);
            self.sampler.start_reading();
        }
        self.sampler.tick(side);
        match self.sampler.occupied() {
            Some(occupied) => {
                self.bay_occupied = occupied;
                self.sampler.reset();
                true
            }
            None => false,
        }
    }

    // Command for the current junction: straight past a full bay, otherwise into it.
    fn choose_bay_command(&mut self) -> JunctionCommand {
        if self.bay_occupied {
            self.bay_occupied = false;
            self.skipping_bay = true;
            info!("Navigation: bay at {} full, going on", self.current_node);
            return JunctionCommand::GoStraight;
        }

        let dropoff = self
            .router
            .map()
            .node(&self.current_node)
            .and_then(|node| node.dropoff);
        match dropoff {
            Some(edge) => {
                let (command, orientation) =
                    GraphRouter::compute_turn(self.current_orientation, edge);
                self.delivered.insert(&self.current_node);
                self.current_orientation = orientation;
                self.skipping_bay = false;
                command
            }
            None => {
                warn!("Navigation: {} has no dropoff bay, going on", self.current_node);
                self.skipping_bay = true;
                JunctionCommand::GoStraight
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MotionConfig, OccupancyConfig};
    use crate::hardware::{Bench, Direction, MockDistanceSensorCapability, MotorId};
    use crate::navigation::map::NodeMap;
    use std::sync::Arc;

    fn t(ms: u32) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    fn navigator_with(bench: &Bench, sampler: BayOccupancySampler, config: &NavigationConfig) -> Navigator {
        let motion = MotionController::new(
            &MotionConfig {
                filter_window: 1,
                ..MotionConfig::default()
            },
            Box::new(bench.drive()),
            Box::new(bench.line_sensors()),
        );
        Navigator::new(
            config,
            GraphRouter::new(Arc::new(NodeMap::standard())),
            motion,
            sampler,
        )
    }

    fn navigator(bench: &Bench) -> Navigator {
        let sampler = BayOccupancySampler::new(&OccupancyConfig::default(), Box::new(bench.distance()));
        navigator_with(bench, sampler, &NavigationConfig::default())
    }

    #[test]
    fn route_from_bay_reverses_out() {
        let bench = Bench::new();
        let mut nav = navigator(&bench);
        nav.set_route("J7", Some("P4"), Some(Orientation::S), t(0)).unwrap();
        assert!(nav.motion().is_reversing());
        assert_eq!(bench.motor(MotorId::Left).map(|m| m.0), Some(Direction::Reverse));
        assert_eq!(nav.current_node(), "J7");
        assert_eq!(nav.current_orientation(), Orientation::N);
    }

    #[test]
    fn failed_route_keeps_position() {
        let bench = Bench::new();
        let mut nav = navigator(&bench);
        let err = nav.set_route("P9", None, None, t(0)).unwrap_err();
        assert!(matches!(err, NavigationError::Route(RouteError::UnknownNode(_))));
        assert_eq!(nav.current_node(), "START_BOX");
        assert_eq!(nav.path_state(), PathFollowingState::Rest);
    }

    #[test]
    fn u_turn_out_of_p4_spins_the_other_way() {
        let bench = Bench::new();
        let mut nav = navigator(&bench);
        nav.set_route("J7", Some("P4"), Some(Orientation::S), t(0)).unwrap();

        nav.motion_mut().enter_junction(t(10));
        nav.tick(t(10)).unwrap();
        assert_eq!(nav.path_state(), PathFollowingState::Turning);
        assert_eq!(nav.motion().pending_turn(), Some(JunctionCommand::UTurn));
        assert_eq!(bench.motor(MotorId::Left).map(|m| m.0), Some(Direction::Forward));
        assert_eq!(bench.motor(MotorId::Right).map(|m| m.0), Some(Direction::Reverse));
    }

    #[test]
    fn exhausted_route_completes_and_stops() {
        let bench = Bench::new();
        let mut nav = navigator(&bench);
        nav.set_route("J29", Some("S"), Some(Orientation::N), t(0)).unwrap();
        nav.motion_mut().enter_junction(t(10));
        nav.tick(t(10)).unwrap();
        assert_eq!(nav.path_state(), PathFollowingState::Complete);
        assert_eq!(nav.motion().state(), MotionState::Rest);
        assert!(bench.motors_stopped());
    }

    #[test]
    fn watchdog_reports_stall() {
        let bench = Bench::new();
        let mut nav = navigator(&bench);
        nav.set_route("P2", Some("S"), Some(Orientation::N), t(0)).unwrap();
        assert!(nav.tick(t(19_000)).is_ok());
        let err = nav.tick(t(20_001)).unwrap_err();
        assert!(matches!(
            err,
            NavigationError::Stalled { state: MotionState::FollowingLine, .. }
        ));
    }

    #[test]
    fn watchdog_can_be_disabled() {
        let bench = Bench::new();
        let config = NavigationConfig {
            stall_timeout_ms: None,
            ..NavigationConfig::default()
        };
        let sampler = BayOccupancySampler::new(&OccupancyConfig::default(), Box::new(bench.distance()));
        let mut nav = navigator_with(&bench, sampler, &config);
        nav.set_route("P2", Some("S"), Some(Orientation::N), t(0)).unwrap();
        assert!(nav.tick(t(1_000_000)).is_ok());
    }

    #[test]
    fn last_bay_is_taken_without_sampling() {
        let bench = Bench::new();
        let mut sensor = MockDistanceSensorCapability::new();
        sensor.expect_read_mm().never();
        let sampler = BayOccupancySampler::new(&OccupancyConfig::default(), Box::new(sensor));
        let mut nav = navigator_with(&bench, sampler, &NavigationConfig::default());

        nav.place("J12", Orientation::N);
        nav.start_dropoff("J12");
        nav.tick(t(0)).unwrap();
        assert_eq!(nav.dropoff_state(), DropoffState::TurnPending);
        nav.tick(t(5)).unwrap();
        assert_eq!(nav.dropoff_state(), DropoffState::Turning);
        assert_eq!(nav.motion().pending_turn(), Some(JunctionCommand::GoLeft));
        assert_eq!(nav.current_node(), "D12");
        assert_eq!(nav.current_orientation(), Orientation::W);
        assert!(nav.delivered().contains("J12"));

        nav.tick(t(10)).unwrap();
        assert_eq!(nav.motion().state(), MotionState::Junction);
    }

    #[test]
    fn delivered_bay_is_skipped_without_sampling() {
        let bench = Bench::new();
        let mut sensor = MockDistanceSensorCapability::new();
        sensor.expect_read_mm().never();
        let sampler = BayOccupancySampler::new(&OccupancyConfig::default(), Box::new(sensor));
        let mut nav = navigator_with(&bench, sampler, &NavigationConfig::default());
        nav.delivered.insert("J3");

        nav.place("J3", Orientation::N);
        nav.start_dropoff("J6");
        nav.tick(t(0)).unwrap();
        nav.tick(t(5)).unwrap();
        assert_eq!(nav.motion().pending_turn(), Some(JunctionCommand::GoStraight));
        assert_eq!(nav.current_node(), "J4");
        assert_eq!(nav.current_orientation(), Orientation::N);
    }

    #[test]
    fn walking_off_the_map_is_an_error() {
        let bench = Bench::new();
        let mut nav = navigator(&bench);
        nav.delivered.insert("J18");
        nav.place("J18", Orientation::N);
        nav.start_dropoff("J13");
        nav.tick(t(0)).unwrap();
        assert!(matches!(
            nav.tick(t(5)),
            Err(NavigationError::OffMap { heading: Orientation::N, .. })
        ));
    }
}
