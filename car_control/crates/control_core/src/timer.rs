use std::time::Duration;
use tokio::time::Instant;

/// A single pending timer. Arming it again replaces the previous deadline, so
/// at most one expiry is ever outstanding.
#[derive(Debug, Default, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn arm(&mut self, now: Instant, delay: Duration) {
        self.at = Some(now + delay);
    }

    pub fn at(&self) -> Option<Instant> {
        self.at
    }

    /// Disarms and returns true once `now` has reached the deadline.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.at {
            Some(at) if now >= at => {
                self.at = None;
                true
            }
            _ => false,
        }
    }
}

/// Sleeps until `at`, or forever when nothing is armed. Meant for `select!`.
pub async fn sleep_until(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
