//! Size-based rolling file sink.
//!
//! Rotation policy lives in [`strategy`]; the sink and its configuration in
//! [`file_sink`].

mod file_sink;
mod strategy;

pub use file_sink::{RollingFileConfig, RollingFileSink, RollingWriter, default_log_path};
pub use strategy::RotationLimits;
