//! Bridge from `tracing` events to a [`TetherLogger`].
//!
//! [`TetherLayer`] is a `tracing_subscriber` layer. Each event becomes one
//! record: the `message` field is the record message and every other field
//! is attached as a structured field. Span context is not recorded.

use std::fmt;

use serde_json::Value;
use tracing::{
    Event, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{Layer, layer::Context};

use crate::{
    level::TetherLevel,
    log_record::{CallSite, Fields},
    logger::{TetherLogger, is_internal_target},
};

/// Layer forwarding `tracing` events to a logger.
pub struct TetherLayer {
    logger: TetherLogger,
}

impl TetherLayer {
    pub fn new(logger: TetherLogger) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &TetherLogger {
        &self.logger
    }
}

#[derive(Default)]
struct EventVisitor {
    message: Option<String>,
    fields: Fields,
}

impl EventVisitor {
    fn record_value(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(text) => text,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_owned(), value);
        }
    }
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_value(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_value(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_value(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record_value(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        // Non-finite floats have no JSON form.
        let value = serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::from(value.to_string()));
        self.record_value(field, value);
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_value(field, Value::from(format!("{value:?}")));
    }
}

impl<S: Subscriber> Layer<S> for TetherLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_internal_target(metadata.target()) {
            return;
        }
        let level = TetherLevel::from(*metadata.level());
        if !self.logger.is_enabled_for(level) {
            return;
        }
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        if metadata.module_path() != Some(metadata.target()) {
            visitor
                .fields
                .entry("target".to_owned())
                .or_insert_with(|| Value::from(metadata.target()));
        }
        let call_site = CallSite::new(
            metadata.module_path().unwrap_or(metadata.target()),
            metadata.file().unwrap_or_default(),
            metadata.line().unwrap_or(0),
        );
        self.logger.log_with_metadata(
            level,
            visitor.message.as_deref().unwrap_or_default(),
            call_site,
            visitor.fields,
        );
    }
}
