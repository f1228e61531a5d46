//! Navigation for the AGV
//!
//! Everything between the node map and the wheels:
//! - [`map`]: the arena graph, pickup bays and reel zones
//! - [`planner`]: breadth-first routes and junction commands
//! - [`line_sensor`], [`pd`], [`drive`]: filtered sensing, PD correction and motor output
//! - [`controller`]: the line-following motion state machine
//! - [`navigator`]: route execution and the dropoff bay search

pub mod controller;
pub mod drive;
pub mod line_sensor;
pub mod map;
pub mod navigator;
pub mod pd;
pub mod planner;

pub use controller::{MotionController, MotionState};
pub use drive::{MotorChannel, TankDrive};
pub use line_sensor::{LineFrame, LineSensorArray, MovingAverage};
pub use map::{JunctionCommand, MapError, Node, NodeMap, Orientation, ReelZone};
pub use navigator::{DropoffState, NavigationError, Navigator, PathFollowingState};
pub use pd::{LateralError, PdController};
pub use planner::{Directions, GraphRouter, PathResult, Route, RouteError, RouteStep};
