//! Heartbeat scheduling and read-deadline tracking for one connection.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, tick};

/// Longest time the read pump holds the connection while waiting for input.
pub const READ_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Tracks when the peer was last heard from.
///
/// Every successful read and every pong renews the deadline; a connection
/// whose deadline passes is treated as dead.
#[derive(Clone, Debug)]
pub struct Liveness {
    pong_timeout: Duration,
    heartbeat_period: Duration,
    last_seen: Instant,
}

impl Liveness {
    pub fn new(pong_timeout: Duration, heartbeat_period: Duration, now: Instant) -> Self {
        Self {
            pong_timeout,
            heartbeat_period,
            last_seen: now,
        }
    }

    pub fn renew(&mut self, now: Instant) {
        self.last_seen = self.last_seen.max(now);
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_seen) >= self.pong_timeout
    }

    /// Time left before the deadline passes.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.pong_timeout
            .saturating_sub(now.saturating_duration_since(self.last_seen))
    }

    /// Socket read timeout used by the read pump.
    pub fn poll_interval(&self) -> Duration {
        READ_POLL_INTERVAL.min(self.pong_timeout)
    }

    /// Channel yielding once per heartbeat period.
    pub fn heartbeat_ticker(&self) -> Receiver<Instant> {
        tick(self.heartbeat_period)
    }
}
