use chrono::{DateTime, Utc};
use std::thread;
use std::time::Duration;

/// Source of "now" plus the pause between burst commits.
///
/// Fakes advance their time on `sleep`, which keeps marker names and
/// commit timestamps distinct without real waiting.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
    fn sleep(&mut self, d: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&mut self, d: Duration) {
        thread::sleep(d);
    }
}
