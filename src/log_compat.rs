//! Compatibility bridge for the Rust `log` crate.
//!
//! [`TetherLogAdapter`] implements `log::Log` and forwards records to a
//! [`TetherLogger`]. Records emitted by tetherlog itself (targets under
//! `tetherlog`) are not forwarded: a sink reporting its own failure must
//! never feed that report back into the sink.

use log::{Metadata, Record};
use serde_json::Value;

use crate::{
    level::TetherLevel,
    log_record::{CallSite, Fields},
    logger::{TetherLogger, is_internal_target},
};

/// Adapter implementing the Rust `log::Log` trait.
pub struct TetherLogAdapter {
    logger: TetherLogger,
}

impl TetherLogAdapter {
    pub fn new(logger: TetherLogger) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &TetherLogger {
        &self.logger
    }
}

fn call_site(record: &Record<'_>) -> CallSite {
    CallSite::new(
        record.module_path().unwrap_or(record.target()),
        record.file().unwrap_or_default(),
        record.line().unwrap_or(0),
    )
}

impl log::Log for TetherLogAdapter {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        !is_internal_target(metadata.target())
            && self
                .logger
                .is_enabled_for(TetherLevel::from(metadata.level()))
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut fields = Fields::new();
        if record.module_path() != Some(record.target()) {
            fields.insert("target".into(), Value::from(record.target()));
        }
        self.logger.log_with_metadata(
            TetherLevel::from(record.level()),
            &record.args().to_string(),
            call_site(record),
            fields,
        );
    }

    fn flush(&self) {
        let _ = self.logger.sync();
    }
}

/// Install `logger` as the global `log` backend.
///
/// The global maximum is opened fully; filtering follows the logger's own
/// level handle so runtime level changes take effect. Fails when another
/// global logger is already installed.
pub fn install_log_bridge(logger: TetherLogger) -> Result<(), log::SetLoggerError> {
    log::set_boxed_logger(Box::new(TetherLogAdapter::new(logger)))?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}
