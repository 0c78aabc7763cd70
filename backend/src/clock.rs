//! Wall-clock access and the pipeline's suspension points.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// Block until `deadline`; returns immediately if it has passed.
    fn sleep_until(&self, deadline: DateTime<Utc>);

    fn sleep(&self, duration: Duration);
}

/// Real time; every wait is a single blocking sleep.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep_until(&self, deadline: DateTime<Utc>) {
        if let Ok(remaining) = (deadline - Utc::now()).to_std() {
            std::thread::sleep(remaining);
        }
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual time that jumps forward instead of blocking.
#[derive(Debug)]
pub struct SimulatedClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<DateTime<Utc>>>,
}

impl SimulatedClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, duration: chrono::Duration) {
        *self.now.lock() += duration;
    }

    /// Targets of every `sleep_until` call, in order.
    pub fn wake_times(&self) -> Vec<DateTime<Utc>> {
        self.sleeps.lock().clone()
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    fn sleep_until(&self, deadline: DateTime<Utc>) {
        self.sleeps.lock().push(deadline);
        let mut now = self.now.lock();
        if deadline > *now {
            *now = deadline;
        }
    }

    fn sleep(&self, duration: Duration) {
        let step = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
        *self.now.lock() += step;
    }
}
