//! Record formatters.
//!
//! Provides the [`TetherFormatter`] trait, the production [`JsonFormatter`]
//! and the development [`ConsoleFormatter`], plus [`SharedFormatter`] for
//! passing a dynamically dispatched formatter between loggers.

use std::{fmt, sync::Arc, time::SystemTime};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::log_record::{Fields, TetherLogRecord};

/// Trait for formatting log records into lines.
///
/// Implementors must be thread-safe (`Send + Sync`) so formatters can be
/// shared across threads.
pub trait TetherFormatter: Send + Sync {
    /// Format a record. The result excludes the trailing newline.
    fn format(&self, record: &TetherLogRecord) -> String;
}

/// Shared formatter trait object used by loggers.
#[derive(Clone)]
pub struct SharedFormatter {
    inner: Arc<dyn TetherFormatter>,
}

impl SharedFormatter {
    pub fn new<F>(formatter: F) -> Self
    where
        F: TetherFormatter + 'static,
    {
        Self {
            inner: Arc::new(formatter),
        }
    }

    pub fn from_arc(inner: Arc<dyn TetherFormatter>) -> Self {
        Self { inner }
    }

    pub fn format(&self, record: &TetherLogRecord) -> String {
        self.inner.format(record)
    }
}

impl fmt::Debug for SharedFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedFormatter(<dyn TetherFormatter>)")
    }
}

impl TetherFormatter for Arc<dyn TetherFormatter> {
    fn format(&self, record: &TetherLogRecord) -> String {
        (**self).format(record)
    }
}

fn timestamp(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Serialize)]
struct JsonLine<'a> {
    level: &'static str,
    ts: String,
    #[serde(skip_serializing_if = "str::is_empty")]
    logger: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    caller: Option<String>,
    msg: &'a str,
    #[serde(flatten)]
    fields: &'a Fields,
}

/// One JSON object per record.
///
/// Keys appear as `level`, `ts`, `logger`, `caller`, `msg`, then the record's
/// fields in key order. A field named like a fixed key is emitted after it,
/// so consumers that keep the last duplicate see the field.
#[derive(Copy, Clone, Debug, Default)]
pub struct JsonFormatter;

impl TetherFormatter for JsonFormatter {
    fn format(&self, record: &TetherLogRecord) -> String {
        let line = JsonLine {
            level: record.level.as_lower_str(),
            ts: timestamp(record.timestamp),
            logger: &record.logger,
            caller: record.call_site.short(),
            msg: &record.message,
            fields: &record.fields,
        };
        serde_json::to_string(&line).unwrap_or_else(|err| {
            format!(
                r#"{{"level":"error","msg":"failed to encode record: {}"}}"#,
                err.to_string().replace('"', "'")
            )
        })
    }
}

/// Tab-separated, human-oriented lines.
#[derive(Copy, Clone, Debug, Default)]
pub struct ConsoleFormatter;

impl TetherFormatter for ConsoleFormatter {
    fn format(&self, record: &TetherLogRecord) -> String {
        let mut line = format!("{}\t{}", timestamp(record.timestamp), record.level);
        if !record.logger.is_empty() {
            line.push('\t');
            line.push_str(&record.logger);
        }
        if let Some(caller) = record.call_site.short() {
            line.push('\t');
            line.push_str(&caller);
        }
        line.push('\t');
        line.push_str(&record.message);
        if !record.fields.is_empty()
            && let Ok(fields) = serde_json::to_string(&record.fields)
        {
            line.push('\t');
            line.push_str(&fields);
        }
        line
    }
}
