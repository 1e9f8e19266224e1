//! Core logger.
//!
//! A [`TetherLogger`] filters records by level, formats each accepted record
//! once, and writes the resulting line to every attached sink. Sinks do their
//! own buffering, so logging never waits on network or disk I/O beyond what a
//! sink's `write` chooses to do.

use std::{fmt, sync::Arc};

use log::warn;
use parking_lot::RwLock;
use serde_json::Value;

use crate::{
    formatter::{JsonFormatter, SharedFormatter},
    level::{LevelHandle, TetherLevel},
    log_record::{CallSite, Fields, TetherLogRecord},
    rate_limited_warner::RateLimitedWarner,
    sink::{SinkError, TetherSinkTrait},
};

type SinkList = Arc<RwLock<Vec<Arc<dyn TetherSinkTrait>>>>;

/// Root of the targets tetherlog uses for its own diagnostics.
const INTERNAL_TARGET: &str = "tetherlog";

/// Whether `target` belongs to tetherlog's own diagnostics.
///
/// Bridges skip these so a failing sink never logs into itself.
pub(crate) fn is_internal_target(target: &str) -> bool {
    target
        .strip_prefix(INTERNAL_TARGET)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

/// Cheap to clone: clones share sinks, level and formatter.
#[derive(Clone)]
pub struct TetherLogger {
    name: String,
    level: LevelHandle,
    formatter: SharedFormatter,
    fields: Fields,
    sinks: SinkList,
    write_warner: Arc<RateLimitedWarner>,
}

impl TetherLogger {
    /// Logger emitting JSON lines at `Info` and above, with no sinks attached.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: LevelHandle::default(),
            formatter: SharedFormatter::new(JsonFormatter),
            fields: Fields::new(),
            sinks: Arc::new(RwLock::new(Vec::new())),
            write_warner: Arc::new(RateLimitedWarner::default()),
        }
    }

    pub fn with_formatter(mut self, formatter: SharedFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_level(self, level: TetherLevel) -> Self {
        self.level.set(level);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Handle controlling the level of this logger and all its children.
    pub fn level_handle(&self) -> LevelHandle {
        self.level.clone()
    }

    pub fn set_level(&self, level: TetherLevel) {
        self.level.set(level);
    }

    pub fn get_level(&self) -> TetherLevel {
        self.level.get()
    }

    pub fn is_enabled_for(&self, level: TetherLevel) -> bool {
        self.level.enabled(level)
    }

    /// Attach a sink. Children created before or after share it.
    pub fn add_sink(&self, sink: Arc<dyn TetherSinkTrait>) {
        self.sinks.write().push(sink);
    }

    /// Detach a sink previously added to this logger.
    pub fn remove_sink(&self, sink: &Arc<dyn TetherSinkTrait>) -> bool {
        let mut sinks = self.sinks.write();
        match sinks.iter().position(|s| Arc::ptr_eq(s, sink)) {
            Some(pos) => {
                sinks.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn clear_sinks(&self) {
        self.sinks.write().clear();
    }

    pub fn sinks(&self) -> Vec<Arc<dyn TetherSinkTrait>> {
        self.sinks.read().clone()
    }

    /// Child logger that adds `fields` to every record.
    ///
    /// The child shares sinks, formatter and level with its parent.
    pub fn with_fields<I, K>(&self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut merged = self.fields.clone();
        merged.extend(fields.into_iter().map(|(k, v)| (k.into(), v)));
        Self {
            fields: merged,
            ..self.child(self.name.clone())
        }
    }

    /// Child logger named `<parent>.<name>`.
    pub fn named(&self, name: &str) -> Self {
        let name = if self.name.is_empty() {
            name.to_owned()
        } else {
            format!("{}.{name}", self.name)
        };
        self.child(name)
    }

    fn child(&self, name: String) -> Self {
        Self {
            name,
            level: self.level.clone(),
            formatter: self.formatter.clone(),
            fields: self.fields.clone(),
            sinks: Arc::clone(&self.sinks),
            write_warner: Arc::clone(&self.write_warner),
        }
    }

    /// Log `message` at `level`.
    ///
    /// Returns the formatted line if the record passed the level check.
    pub fn log(&self, level: TetherLevel, message: &str) -> Option<String> {
        self.log_record(TetherLogRecord::new(&self.name, level, message))
    }

    /// Log with an explicit call site and per-call fields.
    pub fn log_with_metadata(
        &self,
        level: TetherLevel,
        message: &str,
        call_site: CallSite,
        fields: Fields,
    ) -> Option<String> {
        if !self.is_enabled_for(level) {
            return None;
        }
        let record = TetherLogRecord::new(&self.name, level, message)
            .with_call_site(call_site)
            .with_fields(fields);
        self.log_record(record)
    }

    /// Filter, format and dispatch a prepared record.
    ///
    /// Logger fields are applied underneath the record's own fields.
    pub fn log_record(&self, mut record: TetherLogRecord) -> Option<String> {
        if !self.is_enabled_for(record.level) {
            return None;
        }
        if !self.fields.is_empty() {
            let mut fields = self.fields.clone();
            fields.append(&mut record.fields);
            record.fields = fields;
        }
        let line = self.formatter.format(&record);
        self.dispatch(&line);
        Some(line)
    }

    pub fn trace(&self, message: &str) -> Option<String> {
        self.log(TetherLevel::Trace, message)
    }

    pub fn debug(&self, message: &str) -> Option<String> {
        self.log(TetherLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> Option<String> {
        self.log(TetherLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> Option<String> {
        self.log(TetherLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> Option<String> {
        self.log(TetherLevel::Error, message)
    }

    pub fn critical(&self, message: &str) -> Option<String> {
        self.log(TetherLevel::Critical, message)
    }

    fn dispatch(&self, line: &str) {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        for sink in self.sinks.read().iter() {
            if sink.write(&bytes).is_err() {
                self.write_warner.record_drop();
            }
        }
        self.write_warner.warn_if_due(|count| {
            warn!(target: "tetherlog::logger", "TetherLogger: {count} sink writes failed");
        });
    }

    /// Flush every sink, returning the first failure.
    pub fn sync(&self) -> Result<(), SinkError> {
        let mut first_err = None;
        for sink in self.sinks.read().iter() {
            if let Err(err) = sink.flush()
                && first_err.is_none()
            {
                first_err = Some(err);
            }
        }
        self.write_warner.flush(|count| {
            warn!(target: "tetherlog::logger", "TetherLogger: {count} sink writes failed");
        });
        first_err.map_or(Ok(()), Err)
    }

    /// Close every sink and detach them, returning the first failure.
    pub fn close(&self) -> Result<(), SinkError> {
        let sinks = std::mem::take(&mut *self.sinks.write());
        let mut first_err = None;
        for sink in sinks {
            match sink.close() {
                Ok(()) | Err(SinkError::AlreadyClosed) => {}
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for TetherLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TetherLogger")
            .field("name", &self.name)
            .field("level", &self.get_level())
            .field("fields", &self.fields)
            .field("sinks", &self.sinks.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::collecting_sink::CollectingSink;
    use rstest::rstest;
    use serde_json::json;

    fn logger_with_sink() -> (TetherLogger, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::default());
        let logger = TetherLogger::new("core");
        logger.add_sink(sink.clone());
        (logger, sink)
    }

    #[rstest]
    fn records_below_level_are_skipped() {
        let (logger, sink) = logger_with_sink();
        assert!(logger.debug("hidden").is_none());
        assert!(logger.info("shown").is_some());
        assert_eq!(sink.lines().len(), 1);
    }

    #[rstest]
    fn lines_are_newline_terminated_json() {
        let (logger, sink) = logger_with_sink();
        logger.warn("disk almost full");
        let lines = sink.lines();
        let parsed: Value = serde_json::from_str(&lines[0]).expect("json line");
        assert_eq!(parsed["msg"], "disk almost full");
        assert_eq!(parsed["level"], "warn");
        assert_eq!(parsed["logger"], "core");
        assert!(sink.contents().ends_with('\n'));
    }

    #[rstest]
    fn child_fields_merge_under_call_fields() {
        let (logger, sink) = logger_with_sink();
        let child = logger
            .with_fields([("service", json!("api")), ("region", json!("eu"))])
            .named("http");
        let mut call_fields = Fields::new();
        call_fields.insert("region".into(), json!("us"));
        child.log_with_metadata(
            TetherLevel::Info,
            "request",
            CallSite::new("app", "src/http.rs", 12),
            call_fields,
        );
        let parsed: Value = serde_json::from_str(&sink.lines()[0]).expect("json line");
        assert_eq!(parsed["logger"], "core.http");
        assert_eq!(parsed["service"], "api");
        assert_eq!(parsed["region"], "us");
        assert_eq!(parsed["caller"], "src/http.rs:12");
    }

    #[rstest]
    fn level_changes_reach_children() {
        let (logger, sink) = logger_with_sink();
        let child = logger.with_fields([("k", json!(1))]);
        logger.set_level(TetherLevel::Debug);
        assert!(child.debug("now visible").is_some());
        assert_eq!(sink.lines().len(), 1);
    }

    #[rstest]
    fn failing_sinks_do_not_stop_others() {
        let (logger, sink) = logger_with_sink();
        let failing = Arc::new(CollectingSink::failing());
        logger.add_sink(failing.clone());
        let healthy: Arc<dyn TetherSinkTrait> = Arc::new(CollectingSink::default());
        logger.add_sink(Arc::clone(&healthy));
        assert!(logger.error("boom").is_some());
        assert_eq!(sink.lines().len(), 1);
        assert!(logger.remove_sink(&healthy));
        assert!(!logger.remove_sink(&healthy));
    }

    #[rstest]
    fn close_detaches_and_closes_sinks() {
        let (logger, sink) = logger_with_sink();
        logger.close().expect("close");
        assert!(sink.is_closed());
        assert!(logger.sinks().is_empty());
        assert!(logger.info("after close").is_some());
        assert!(sink.lines().is_empty());
    }

    #[rstest]
    fn sync_reports_first_flush_error() {
        let (logger, _sink) = logger_with_sink();
        logger.add_sink(Arc::new(CollectingSink::failing()));
        assert!(logger.sync().is_err());
    }

    #[rstest]
    fn clones_share_sinks_and_level() {
        let (logger, sink) = logger_with_sink();
        let clone = logger.clone();
        clone.set_level(TetherLevel::Warn);
        assert!(logger.info("filtered").is_none());
        clone.warn("from clone");
        assert_eq!(sink.lines().len(), 1);
        assert_eq!(clone.name(), "core");
    }
}
