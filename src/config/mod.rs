//! Declarative logger configuration.
//!
//! A [`LoggerConfig`] is usually read from JSON, optionally adjusted from the
//! environment, and realised against a [`SinkRegistry`](crate::SinkRegistry).

mod build;
mod types;

pub use build::{ENV_CONSOLE, ENV_DEVELOPMENT};
pub use types::{ConfigError, LoggerConfig, WriteConfig};
