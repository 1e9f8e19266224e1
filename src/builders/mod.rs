//! Sink builders and associated traits.
//!
//! Builders validate user-supplied settings before any thread is spawned or
//! file opened. Each implements [`SinkBuilderTrait`], returning a shared
//! [`TetherSinkTrait`] object ready to attach to a logger.

use std::{io, sync::Arc};

use thiserror::Error;

use crate::sink::TetherSinkTrait;

/// Errors that may occur while building a sink.
#[derive(Debug, Error)]
pub enum SinkBuildError {
    /// Invalid user supplied configuration.
    #[error("invalid sink configuration: {0}")]
    InvalidConfig(String),
    /// Underlying I/O error whilst creating the sink.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Trait implemented by all sink builders.
pub trait SinkBuilderTrait: Send + Sync {
    /// Build the sink instance.
    fn build_sink(&self) -> Result<Arc<dyn TetherSinkTrait>, SinkBuildError>;
}

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err($crate::builders::SinkBuildError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

pub(crate) use {ensure_positive, option_setter};

mod rolling_file_builder;
mod websocket_builder;

pub use rolling_file_builder::RollingFileSinkBuilder;
pub use websocket_builder::{RetryOverrides, WebSocketSinkBuilder};
