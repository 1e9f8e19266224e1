//! Configuration structures consumed by the WebSocket sink lifecycle.
//!
//! `WebSocketSinkBuilder` and the sink registry construct these values before
//! passing them to [`WebSocketSink`](super::WebSocketSink) for runtime use.
//! Durations are (de)serialised as whole milliseconds under `*_ms` keys.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::rate_limited_warner::DEFAULT_WARN_INTERVAL;

/// Default time allowed for a single send to the peer.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);
/// Default time the peer may stay silent before the connection is declared dead.
pub const DEFAULT_PONG_TIMEOUT: Duration = Duration::from_secs(60);
/// Default heartbeat period, nine tenths of the pong timeout.
pub const DEFAULT_HEARTBEAT_PERIOD: Duration = Duration::from_secs(54);
/// Default maximum size of an inbound frame.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 512;
/// Default bounded queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
/// Default timeout for the TCP connect and the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default base interval between dial attempts.
pub const DEFAULT_RETRY_BASE: Duration = Duration::from_secs(1);
/// Role announced to the peer during the handshake.
pub const DEFAULT_ROLE: &str = "sender";

/// Static configuration for a [`WebSocketSink`](super::WebSocketSink).
///
/// Only these fields survive [`WebSocketSink::duplicate`](super::WebSocketSink::duplicate);
/// all runtime state is allocated afresh.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebSocketSinkConfig {
    /// `ws://` or `wss://` endpoint of the peer.
    pub url: String,
    /// Suppress output until the peer reports a listener.
    pub gate_on_peer_presence: bool,
    #[serde(rename = "write_timeout_ms", with = "duration_ms")]
    pub write_timeout: Duration,
    #[serde(rename = "pong_timeout_ms", with = "duration_ms")]
    pub pong_timeout: Duration,
    #[serde(rename = "heartbeat_period_ms", with = "duration_ms")]
    pub heartbeat_period: Duration,
    /// Largest inbound frame or message accepted from the peer.
    pub max_frame_size: usize,
    pub queue_capacity: usize,
    #[serde(rename = "connect_timeout_ms", with = "duration_ms")]
    pub connect_timeout: Duration,
    #[serde(rename = "retry_base_ms", with = "duration_ms")]
    pub retry_base: Duration,
    /// Upper bound for the doubled retry interval. Defaults to `write_timeout`.
    #[serde(rename = "retry_cap_ms", with = "option_duration_ms")]
    pub retry_cap: Option<Duration>,
    /// Bound on how long `close` waits for the queue to drain. Defaults to
    /// `write_timeout`.
    #[serde(rename = "close_timeout_ms", with = "option_duration_ms")]
    pub close_timeout: Option<Duration>,
    /// Value of the `role` query parameter and header sent when dialing.
    pub role: String,
    #[serde(rename = "warn_interval_ms", with = "duration_ms")]
    pub warn_interval: Duration,
}

impl Default for WebSocketSinkConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            gate_on_peer_presence: true,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            pong_timeout: DEFAULT_PONG_TIMEOUT,
            heartbeat_period: DEFAULT_HEARTBEAT_PERIOD,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            retry_base: DEFAULT_RETRY_BASE,
            retry_cap: None,
            close_timeout: None,
            role: DEFAULT_ROLE.to_owned(),
            warn_interval: DEFAULT_WARN_INTERVAL,
        }
    }
}

impl WebSocketSinkConfig {
    /// Default configuration targeting `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Override the endpoint.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Retry policy derived from the configured intervals.
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            base: self.retry_base,
            cap: self.retry_cap.unwrap_or(self.write_timeout),
        }
    }

    /// Check invariants the lifecycle relies on.
    pub fn validate(&self) -> Result<(), String> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err("websocket sink requires a url".into());
        }
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(format!("url must use ws:// or wss://, got {url:?}"));
        }
        for (field, value) in [
            ("write_timeout_ms", self.write_timeout),
            ("pong_timeout_ms", self.pong_timeout),
            ("heartbeat_period_ms", self.heartbeat_period),
            ("connect_timeout_ms", self.connect_timeout),
            ("retry_base_ms", self.retry_base),
        ] {
            if value.is_zero() {
                return Err(format!("{field} must be greater than zero"));
            }
        }
        if self.heartbeat_period >= self.pong_timeout {
            return Err("heartbeat_period_ms must be shorter than pong_timeout_ms".into());
        }
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be greater than zero".into());
        }
        if self.max_frame_size == 0 {
            return Err("max_frame_size must be greater than zero".into());
        }
        if let Some(cap) = self.retry_cap
            && cap < self.retry_base
        {
            return Err("retry_cap_ms must not be shorter than retry_base_ms".into());
        }
        if !self
            .role
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(format!(
                "role may only contain ASCII letters, digits, '-' and '_', got {:?}",
                self.role
            ));
        }
        Ok(())
    }
}

/// Dial retry policy: the interval doubles after every failed attempt and
/// falls back to `base` once the doubled value would exceed `cap`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_RETRY_BASE,
            cap: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod option_duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer
                .serialize_some(&u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
