//! Time abstraction for retry waits and the workflow deadline.
//!
//! The synchronous default sleeps on a real clock; tests inject a
//! `ManualClock` so retry-wait and timeout scenarios run instantly and
//! deterministically instead of burning wall-clock time.

use std::cell::RefCell;
use std::time::{Duration, Instant};

pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// A clock whose `now()` only advances when told to, so tests can exercise
/// retry waits and deadline expiry without actually waiting.
pub struct ManualClock {
    current: RefCell<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            current: RefCell::new(Instant::now()),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.borrow_mut();
        *current += duration;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.current.borrow()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
