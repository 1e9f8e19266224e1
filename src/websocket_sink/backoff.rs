//! Dial retry interval state machine used by the lifecycle manager.

use std::time::Duration;

use super::config::BackoffPolicy;

/// Floor applied so a zero base never turns into a busy loop.
const MIN_SLEEP: Duration = Duration::from_millis(10);

/// Tracks the current dial retry interval.
///
/// Each failure doubles the interval. When the doubled interval would exceed
/// the cap it falls back to the base instead of staying pinned at the cap,
/// so retries cycle through short and long waits.
pub struct BackoffState {
    policy: BackoffPolicy,
    current: Duration,
}

impl BackoffState {
    /// Create a new state machine from the supplied policy.
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            current: policy.base,
            policy,
        }
    }

    /// Interval the next wait will use.
    pub fn current(&self) -> Duration {
        self.current.max(MIN_SLEEP)
    }

    /// Return the wait before the next dial and advance for the following one.
    pub fn next_sleep(&mut self) -> Duration {
        let sleep = self.current();
        let doubled = self.current.saturating_mul(2);
        self.current = if doubled > self.policy.cap {
            self.policy.base
        } else {
            doubled
        };
        sleep
    }

    /// Return to the base interval after a successful dial.
    pub fn reset(&mut self) {
        self.current = self.policy.base;
    }
}
