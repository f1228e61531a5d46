// core/scheduler.rs

// Cooperative scheduling for the control loop. A periodic ticker posts tick requests
// into a queue; the executor drains the queue, running each request to completion,
// before the mission pass. Requests are idempotent: a request already waiting is not
// queued twice, so a late executor never runs a burst of stale ticks.

// Dependencies
use log::trace;
use std::collections::VecDeque;
use super::clock::Timestamp;

// Work posted by the periodic timer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TickRequest {
    Motion,    // Line following and junction handling
    Debounce,  // Button sampling
}

// FIFO of pending requests without duplicates
#[derive(Debug, Default)]
pub struct TickQueue {
    pending: VecDeque<TickRequest>,
}

impl TickQueue {
    pub fn new() -> Self {
        TickQueue::default()
    }

    /// Queue `request`; false if it was already waiting
    pub fn push(&mut self, request: TickRequest) -> bool {
        if self.pending.contains(&request) {
            trace!("Scheduler: {:?} already pending", request);
            return false;
        }
        self.pending.push_back(request);
        true
    }

    pub fn pop(&mut self) -> Option<TickRequest> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

// Periodic timer posting a motion and a debounce request each period
#[derive(Debug, Clone)]
pub struct Ticker {
    period_ms: u32,
    next_due: Option<Timestamp>,
}

impl Ticker {
    /// Fires every `period_ms`, at least 1 ms
    pub fn new(period_ms: u32) -> Self {
        Ticker {
            period_ms: period_ms.max(1),
            next_due: None,
        }
    }

    /// Ticker for a loop rate in Hz
    pub fn from_rate(hz: u32) -> Self {
        Ticker::new(1000 / hz.max(1))
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    /// Post requests if a period has elapsed; true when the timer fired
    pub fn poll(&mut self, now: Timestamp, queue: &mut TickQueue) -> bool {
        let due = self.next_due.unwrap_or(now);
        // Not yet due while `due` is still ahead of `now` on the wrapping clock.
        let ahead = due.elapsed_since(now);
        if ahead != 0 && ahead < u32::MAX / 2 {
            return false;
        }
        queue.push(TickRequest::Motion);
        queue.push(TickRequest::Debounce);

        let next = due.add_millis(self.period_ms);
        // Skip missed periods instead of firing a catch-up burst.
        self.next_due = if now.elapsed_since(next) < u32::MAX / 2 {
            Some(now.add_millis(self.period_ms))
        } else {
            Some(next)
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(ms: u32) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    #[test]
    fn queue_is_idempotent() {
        let mut queue = TickQueue::new();
        assert!(queue.push(TickRequest::Motion));
        assert!(!queue.push(TickRequest::Motion));
        assert!(queue.push(TickRequest::Debounce));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(TickRequest::Motion));
        assert!(queue.push(TickRequest::Motion));
        assert_eq!(queue.pop(), Some(TickRequest::Debounce));
        assert_eq!(queue.pop(), Some(TickRequest::Motion));
        assert!(queue.is_empty());
    }

    #[test]
    fn ticker_fires_once_per_period() {
        let mut ticker = Ticker::from_rate(200);
        let mut queue = TickQueue::new();
        assert_eq!(ticker.period_ms(), 5);
        assert!(ticker.poll(t(100), &mut queue));
        assert!(!ticker.poll(t(102), &mut queue));
        assert!(ticker.poll(t(105), &mut queue));
        assert_eq!(queue.len(), 2, "undrained requests are not duplicated");
    }

    #[test]
    fn late_poll_does_not_burst() {
        let mut ticker = Ticker::new(5);
        let mut queue = TickQueue::new();
        ticker.poll(t(0), &mut queue);
        assert!(ticker.poll(t(50), &mut queue));
        assert!(!ticker.poll(t(52), &mut queue));
        assert!(ticker.poll(t(55), &mut queue));
    }

    #[test]
    fn ticker_survives_clock_wrap() {
        let mut ticker = Ticker::new(5);
        let mut queue = TickQueue::new();
        let start = t(u32::MAX - 2);
        assert!(ticker.poll(start, &mut queue));
        assert!(!ticker.poll(start.add_millis(3), &mut queue));
        assert!(ticker.poll(start.add_millis(5), &mut queue));
    }
}
