// core/state.rs

// Top-level mission states. The mission controller drives these; everything else in
// the robot reports progress through its own smaller state machine.

// Dependencies
use std::fmt;

// Why a run stopped early
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MissionFault {
    NoRoute(String),      // Router could not produce a route
    Stalled(String),      // Motion made no progress within the watchdog timeout
    OffMap(String),       // Position update walked off the map
}

impl fmt::Display for MissionFault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MissionFault::NoRoute(msg) => write!(f, "no route: {}", msg),
            MissionFault::Stalled(msg) => write!(f, "stalled: {}", msg),
            MissionFault::OffMap(msg) => write!(f, "off map: {}", msg),
        }
    }
}

// Mission states in the order a normal cycle visits them
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MissionState {
    Rest,                 // Waiting to leave the start box
    MovingToPickup,       // Following a route to a pickup bay
    PickingUp,            // Grabber closing and classifying
    MovingToDropoff,      // Following a route to the reel's zone entry
    MovingToDropoffBay,   // Searching the zone for a free bay
    DroppingOff,          // Grabber releasing
    EndingRun,            // Returning home
    Finished,             // Parked or aborted
    Fault(MissionFault),  // Stopped on an unrecoverable error
}

impl MissionState {
    /// True once the mission will not move again
    pub fn is_terminal(&self) -> bool {
        matches!(self, MissionState::Finished | MissionState::Fault(_))
    }
}
