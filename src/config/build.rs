//! Construction and realisation of [`LoggerConfig`].

use std::{env, fs, path::Path, sync::Arc};

use log::warn;
use serde_json::Value;

use super::types::{ConfigError, LoggerConfig, WriteConfig};
use crate::{
    formatter::{ConsoleFormatter, JsonFormatter, SharedFormatter},
    level::TetherLevel,
    logger::TetherLogger,
    registry::SinkRegistry,
    sink::TetherSinkTrait,
    stream_sink::ConsoleSink,
};

/// Environment variable enabling development mode.
pub const ENV_DEVELOPMENT: &str = "TETHERLOG_DEV";
/// Environment variable enabling the stdout sink.
pub const ENV_CONSOLE: &str = "TETHERLOG_CONSOLE";

/// Registry name consulted for the stdout sink when `console` is set.
const CONSOLE_SINK: &str = "console";

impl LoggerConfig {
    /// Production settings with console output enabled.
    pub fn default_config() -> Self {
        Self {
            name: String::new(),
            level: None,
            development: false,
            console: true,
            fields: Default::default(),
            writes: Vec::new(),
        }
    }

    /// Development settings: console lines at debug level.
    pub fn debug_config() -> Self {
        Self {
            level: Some(TetherLevel::Debug),
            development: true,
            ..Self::default_config()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn effective_level(&self) -> TetherLevel {
        self.level.unwrap_or(if self.development {
            TetherLevel::Debug
        } else {
            TetherLevel::Info
        })
    }

    pub fn formatter(&self) -> SharedFormatter {
        if self.development {
            SharedFormatter::new(ConsoleFormatter)
        } else {
            SharedFormatter::new(JsonFormatter)
        }
    }

    pub fn add_write(&mut self, write: WriteConfig) -> &mut Self {
        self.writes.push(write);
        self
    }

    pub fn add_field(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Merge `fields` into the configured fields, replacing existing keys.
    pub fn with_fields<I, K>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.fields
            .extend(fields.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    /// Override `development` and `console` from `TETHERLOG_DEV` and
    /// `TETHERLOG_CONSOLE`. Unset variables leave the value untouched.
    pub fn apply_env(&mut self) -> &mut Self {
        self.apply_env_from(|key| env::var(key).ok())
    }

    pub(crate) fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> &mut Self {
        if let Some(value) = env_flag(ENV_DEVELOPMENT, lookup(ENV_DEVELOPMENT)) {
            self.development = value;
        }
        if let Some(value) = env_flag(ENV_CONSOLE, lookup(ENV_CONSOLE)) {
            self.console = value;
        }
        self
    }

    /// Build a logger with every configured sink attached.
    ///
    /// With `console` set the registry's `console` entry is used when present,
    /// plain stdout otherwise. Sinks built before a failing entry are closed
    /// again before the error is returned.
    pub fn build(&self, registry: &SinkRegistry) -> Result<TetherLogger, ConfigError> {
        let logger = TetherLogger::new(self.name.clone())
            .with_formatter(self.formatter())
            .with_level(self.effective_level())
            .with_fields(self.fields.clone());
        if let Err(err) = self.attach_sinks(&logger, registry) {
            if let Err(close_err) = logger.close() {
                warn!(
                    target: "tetherlog::config",
                    "failed to close partially built logger: {close_err}"
                );
            }
            return Err(err);
        }
        Ok(logger)
    }

    fn attach_sinks(
        &self,
        logger: &TetherLogger,
        registry: &SinkRegistry,
    ) -> Result<(), ConfigError> {
        if self.console {
            let console: Arc<dyn TetherSinkTrait> = if registry.contains(CONSOLE_SINK) {
                registry.resolve(CONSOLE_SINK, None)?
            } else {
                Arc::new(ConsoleSink::stdout())
            };
            logger.add_sink(console);
        }
        for (index, write) in self.writes.iter().enumerate() {
            let name = write.name.trim();
            if name.is_empty() {
                return Err(ConfigError::MissingWriteName { index });
            }
            logger.add_sink(registry.resolve(name, write.config.as_ref())?);
        }
        Ok(())
    }
}

fn env_flag(key: &str, raw: Option<String>) -> Option<bool> {
    let raw = raw?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => {
            warn!(target: "tetherlog::config", "ignoring {key}={raw:?}: expected a boolean");
            None
        }
    }
}
