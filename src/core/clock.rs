// core/clock.rs

// Monotonic millisecond time base shared by every state machine. Timestamps are a
// wrapping u32 counter, so all comparisons go through `elapsed_since` rather than
// raw subtraction.

use std::time::Instant;

/// A point on the wrapping millisecond clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Timestamp(u32);

impl Timestamp {
    /// Wraps a raw millisecond counter value.
    pub const fn from_millis(ms: u32) -> Self {
        Timestamp(ms)
    }

    /// Raw millisecond counter value.
    pub const fn as_millis(self) -> u32 {
        self.0
    }

    /// Milliseconds elapsed from `earlier` to `self`, tolerant of counter wraparound.
    pub fn elapsed_since(self, earlier: Timestamp) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// Timestamp `ms` milliseconds later, wrapping.
    pub fn add_millis(self, ms: u32) -> Self {
        Timestamp(self.0.wrapping_add(ms))
    }
}

/// Source of timestamps for the control loop.
pub trait Clock {
    /// Current time.
    fn now(&self) -> Timestamp;
}

/// Host clock backed by `std::time::Instant`.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        // Truncation is the wraparound.
        Timestamp(self.origin.elapsed().as_millis() as u32)
    }
}
