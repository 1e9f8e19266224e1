//! Structured logging with console, rolling file, and WebSocket sinks.
//!
//! A [`TetherLogger`] formats records once and fans the resulting line out
//! to every attached [`TetherSinkTrait`] implementation. Loggers are usually
//! assembled from a [`LoggerConfig`] resolved against a [`SinkRegistry`]:
//!
//! ```no_run
//! use tetherlog::{LoggerConfig, SinkRegistry};
//!
//! let config = LoggerConfig::from_json_str(
//!     r#"{"name": "api", "writes": [{"name": "websocket", "config": {"url": "ws://127.0.0.1:9000/logs"}}]}"#,
//! )?;
//! let logger = config.build(&SinkRegistry::with_defaults())?;
//! logger.info("listening");
//! logger.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod builders;
mod config;
mod formatter;
mod level;
#[cfg(feature = "log-compat")]
mod log_compat;
mod log_record;
mod logger;
mod logging_macros;
mod rate_limited_warner;
mod registry;
mod rotating;
mod sink;
mod stream_sink;
#[cfg(feature = "tracing-compat")]
mod tracing_compat;
mod websocket_sink;

#[cfg(test)]
mod test_utils;

pub use builders::{
    RetryOverrides, RollingFileSinkBuilder, SinkBuildError, SinkBuilderTrait,
    WebSocketSinkBuilder,
};
pub use config::{ConfigError, ENV_CONSOLE, ENV_DEVELOPMENT, LoggerConfig, WriteConfig};
pub use formatter::{ConsoleFormatter, JsonFormatter, SharedFormatter, TetherFormatter};
pub use level::{LevelHandle, ParseLevelError, TetherLevel};
#[cfg(feature = "log-compat")]
pub use log_compat::{TetherLogAdapter, install_log_bridge};
pub use log_record::{CallSite, Fields, TetherLogRecord};
pub use logger::TetherLogger;
pub use rate_limited_warner::{DEFAULT_WARN_INTERVAL, RateLimitedWarner};
pub use registry::{ConfigPrototype, InstancePrototype, SinkPrototype, SinkRegistry};
pub use rotating::{
    RollingFileConfig, RollingFileSink, RollingWriter, RotationLimits, default_log_path,
};
pub use sink::{SinkError, TetherSinkTrait};
pub use stream_sink::{ConsoleConfig, ConsoleSink, ConsoleTarget};
#[cfg(feature = "tracing-compat")]
pub use tracing_compat::TetherLayer;
pub use websocket_sink::{
    BackoffPolicy, COMMAND_PEER_OFFLINE, COMMAND_PEER_ONLINE, ConnectHandler, ControlSignal,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_HEARTBEAT_PERIOD, DEFAULT_MAX_FRAME_SIZE,
    DEFAULT_PONG_TIMEOUT, DEFAULT_QUEUE_CAPACITY, DEFAULT_RETRY_BASE, DEFAULT_ROLE,
    DEFAULT_WRITE_TIMEOUT, Envelope, EnvelopeKind, FRAME_TYPE_COMMAND, FRAME_TYPE_DATA, Phase,
    WebSocketSink, WebSocketSinkConfig, decode_control,
};

#[doc(hidden)]
pub use serde_json as __serde_json;
