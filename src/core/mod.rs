// core/mod.rs

// Declares the mission-level submodules: the clock and scheduler that pace the control
// loop, the operator panel, bay bookkeeping and occupancy sensing, and the mission state
// machine that ties them to navigation and the grabber.

pub mod clock;
pub mod memory;
pub mod mission;
pub mod panel;
pub mod perception;
pub mod scheduler;
pub mod state;

// Re-export key types for a flat API
pub use clock::{Clock, SystemClock, Timestamp};
pub use memory::{DeliveredBaySet, PickupBayRegistry};
pub use mission::MissionController;
pub use panel::{ButtonDebouncer, IndicatorPanel, LED_COUNT};
pub use perception::{sensor_side_for, BayOccupancySampler, OccupancyState};
pub use scheduler::{TickQueue, TickRequest, Ticker};
pub use state::{MissionFault, MissionState};
