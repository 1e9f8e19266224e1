//! Builder for [`WebSocketSink`].
//!
//! Exposes endpoint selection, queue sizing, timeout tuning, peer gating and
//! retry intervals. Timeouts are given in milliseconds to match the
//! declarative configuration keys.

use std::{fmt, sync::Arc, time::Duration};

use super::{SinkBuildError, SinkBuilderTrait, ensure_positive, option_setter};
use crate::{
    sink::TetherSinkTrait,
    websocket_sink::{ConnectHandler, WebSocketSink, WebSocketSinkConfig},
};

/// Overrides for the dial retry intervals.
#[derive(Clone, Debug, Default)]
pub struct RetryOverrides {
    base_ms: Option<u64>,
    cap_ms: Option<u64>,
}

impl RetryOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the first retry interval in milliseconds.
    pub fn with_base_ms(mut self, base_ms: u64) -> Self {
        self.base_ms = Some(base_ms);
        self
    }

    /// Override the largest retry interval in milliseconds.
    pub fn with_cap_ms(mut self, cap_ms: u64) -> Self {
        self.cap_ms = Some(cap_ms);
        self
    }

    fn apply(&self, config: &mut WebSocketSinkConfig) -> Result<(), SinkBuildError> {
        if let Some(base) = self.base_ms {
            config.retry_base = Duration::from_millis(ensure_positive!(base, "retry_base_ms")?);
        }
        if let Some(cap) = self.cap_ms {
            config.retry_cap = Some(Duration::from_millis(ensure_positive!(
                cap,
                "retry_cap_ms"
            )?));
        }
        Ok(())
    }
}

/// Builder for constructing [`WebSocketSink`] instances.
#[derive(Clone, Default)]
pub struct WebSocketSinkBuilder {
    base: WebSocketSinkConfig,
    queue_capacity: Option<usize>,
    write_timeout_ms: Option<u64>,
    pong_timeout_ms: Option<u64>,
    heartbeat_period_ms: Option<u64>,
    connect_timeout_ms: Option<u64>,
    close_timeout_ms: Option<u64>,
    max_frame_size: Option<usize>,
    gate_on_peer_presence: Option<bool>,
    role: Option<String>,
    retry: RetryOverrides,
    on_connect: Option<ConnectHandler>,
}

impl WebSocketSinkBuilder {
    /// Builder targeting `url` with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self::from_config(WebSocketSinkConfig::new(url))
    }

    /// Builder starting from an existing configuration.
    pub fn from_config(config: WebSocketSinkConfig) -> Self {
        Self {
            base: config,
            ..Self::default()
        }
    }

    option_setter!(
        #[doc = "Set the bounded queue capacity."]
        with_queue_capacity,
        queue_capacity,
        usize
    );
    option_setter!(with_write_timeout_ms, write_timeout_ms, u64);
    option_setter!(with_pong_timeout_ms, pong_timeout_ms, u64);
    option_setter!(with_heartbeat_period_ms, heartbeat_period_ms, u64);
    option_setter!(with_connect_timeout_ms, connect_timeout_ms, u64);
    option_setter!(
        #[doc = "Bound how long `close` waits for queued output."]
        with_close_timeout_ms,
        close_timeout_ms,
        u64
    );
    option_setter!(with_max_frame_size, max_frame_size, usize);
    option_setter!(
        #[doc = "Suppress output until the peer reports a consumer."]
        with_gating,
        gate_on_peer_presence,
        bool
    );

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Override the dial retry intervals.
    pub fn with_retry(mut self, overrides: RetryOverrides) -> Self {
        self.retry = overrides;
        self
    }

    /// Run `handler` every time a connection is established.
    pub fn with_connect_handler(mut self, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(handler));
        self
    }

    fn validate(&self) -> Result<(), SinkBuildError> {
        if let Some(capacity) = self.queue_capacity {
            ensure_positive!(capacity, "queue_capacity")?;
        }
        if let Some(size) = self.max_frame_size {
            ensure_positive!(size, "max_frame_size")?;
        }
        for (field, value) in [
            ("write_timeout_ms", self.write_timeout_ms),
            ("pong_timeout_ms", self.pong_timeout_ms),
            ("heartbeat_period_ms", self.heartbeat_period_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("close_timeout_ms", self.close_timeout_ms),
        ] {
            if let Some(ms) = value {
                ensure_positive!(ms, field)?;
            }
        }
        Ok(())
    }

    /// Resolve the final configuration without starting a sink.
    pub fn build_config(&self) -> Result<WebSocketSinkConfig, SinkBuildError> {
        self.validate()?;
        let mut config = self.base.clone();
        self.apply_optional_fields(&mut config);
        self.retry.apply(&mut config)?;
        config.validate().map_err(SinkBuildError::InvalidConfig)?;
        Ok(config)
    }

    fn apply_optional_fields(&self, config: &mut WebSocketSinkConfig) {
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }
        if let Some(ms) = self.write_timeout_ms {
            config.write_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.pong_timeout_ms {
            config.pong_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.heartbeat_period_ms {
            config.heartbeat_period = Duration::from_millis(ms);
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.close_timeout_ms {
            config.close_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(size) = self.max_frame_size {
            config.max_frame_size = size;
        }
        if let Some(gate) = self.gate_on_peer_presence {
            config.gate_on_peer_presence = gate;
        }
        if let Some(role) = &self.role {
            config.role.clone_from(role);
        }
    }

    /// Validate the settings and start the sink.
    pub fn build(&self) -> Result<WebSocketSink, SinkBuildError> {
        let config = self.build_config()?;
        Ok(WebSocketSink::start(config, self.on_connect.clone())?)
    }
}

impl SinkBuilderTrait for WebSocketSinkBuilder {
    fn build_sink(&self) -> Result<Arc<dyn TetherSinkTrait>, SinkBuildError> {
        Ok(Arc::new(self.build()?))
    }
}

impl fmt::Debug for WebSocketSinkBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketSinkBuilder")
            .field("base", &self.base)
            .field("queue_capacity", &self.queue_capacity)
            .field("write_timeout_ms", &self.write_timeout_ms)
            .field("close_timeout_ms", &self.close_timeout_ms)
            .field("role", &self.role)
            .field("retry", &self.retry)
            .field("on_connect", &self.on_connect.is_some())
            .finish_non_exhaustive()
    }
}
