//! Type definitions for declarative logger configuration.

use std::{fmt, io};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{builders::SinkBuildError, level::TetherLevel, log_record::Fields};

/// Errors raised while parsing or realising a [`LoggerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A write entry named a sink the registry does not know.
    #[error("unknown sink: {0}")]
    UnknownSink(String),
    /// A write entry had no `name`.
    #[error("write entry {index} has no name")]
    MissingWriteName {
        /// Position of the entry in `writes`.
        index: usize,
    },
    /// The entry's `config` did not fit the sink's settings.
    #[error("invalid settings for sink {name}: {source}")]
    InvalidSinkSettings {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    /// Settings were given for a sink that is shared as a single instance.
    #[error("sink {0} is shared and does not accept settings")]
    SharedSinkSettings(String),
    /// Building the sink failed.
    #[error("failed to build sink {name}: {source}")]
    SinkBuild {
        name: String,
        #[source]
        source: SinkBuildError,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read configuration: {0}")]
    Io(#[from] io::Error),
}

/// One output target: a registry name plus optional settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WriteConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

impl WriteConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: None,
        }
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }
}

/// Declarative description of a logger and its outputs.
///
/// ```json
/// { "name": "app", "level": "info", "development": false, "console": true,
///   "fields": {"service": "api"},
///   "writes": [ {"name": "websocket", "config": {"url": "ws://host/logs"}} ] }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggerConfig {
    pub name: String,
    /// Minimum level. Defaults to `debug` in development mode and `info`
    /// otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<TetherLevel>,
    /// Human-oriented console lines instead of JSON.
    pub development: bool,
    /// Also write to stdout.
    pub console: bool,
    /// Fields attached to every record.
    pub fields: Fields,
    pub writes: Vec<WriteConfig>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl fmt::Display for LoggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(
                f,
                "level: {} development: {} console: {}",
                self.effective_level(),
                self.development,
                self.console
            ),
        }
    }
}
