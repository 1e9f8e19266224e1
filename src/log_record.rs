//! Log record representation.
//!
//! A `TetherLogRecord` captures one log event together with its source
//! location and the structured fields in effect when it was created.

use std::{collections::BTreeMap, fmt, time::SystemTime};

use serde_json::Value;

use crate::level::TetherLevel;

/// Structured key-value pairs attached to a record.
pub type Fields = BTreeMap<String, Value>;

/// Where the log call originated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallSite {
    /// Rust module path or other origin label.
    pub module_path: String,
    pub filename: String,
    pub line_number: u32,
}

impl CallSite {
    pub fn new(module_path: &str, filename: &str, line_number: u32) -> Self {
        Self {
            module_path: module_path.to_owned(),
            filename: filename.to_owned(),
            line_number,
        }
    }

    /// `file:line`, trimmed to the last two path components.
    pub fn short(&self) -> Option<String> {
        if self.filename.is_empty() {
            return None;
        }
        let mut parts = self.filename.rsplit(['/', '\\']);
        let file = parts.next().unwrap_or_default();
        let short = match parts.next() {
            Some(dir) if !dir.is_empty() => format!("{dir}/{file}"),
            _ => file.to_owned(),
        };
        Some(format!("{short}:{}", self.line_number))
    }
}

#[derive(Clone, Debug)]
pub struct TetherLogRecord {
    /// Name of the logger that created this record.
    pub logger: String,
    pub level: TetherLevel,
    pub message: String,
    /// Time the record was created.
    pub timestamp: SystemTime,
    pub call_site: CallSite,
    pub fields: Fields,
}

impl TetherLogRecord {
    pub fn new(logger: &str, level: TetherLevel, message: &str) -> Self {
        Self {
            logger: logger.to_owned(),
            level,
            message: message.to_owned(),
            timestamp: SystemTime::now(),
            call_site: CallSite::default(),
            fields: Fields::new(),
        }
    }

    /// Attach a source location.
    pub fn with_call_site(mut self, call_site: CallSite) -> Self {
        self.call_site = call_site;
        self
    }

    /// Merge `fields` into the record, replacing existing keys.
    pub fn with_fields<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        self.fields.extend(fields);
        self
    }
}

impl fmt::Display for TetherLogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.level, self.message)
    }
}
