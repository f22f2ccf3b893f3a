// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::dispatcher::Dispatcher;
use crate::record::{Level, LogRecord};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing_core::field::{Field, Visit};
use tracing_core::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Targets whose events are never forwarded. Shipping a batch emits events
/// from these crates, and forwarding them would feed the log sink its own
/// diagnostics.
const IGNORED_TARGETS: [&str; 5] = ["remote_telemetry", "reqwest", "hyper", "h2", "rustls"];

/// Forwards `tracing` events to the log sink as [`LogRecord`]s.
///
/// Fields named `trace_id` and `span_id` populate the record's trace
/// context; every other field except `message` lands in `fields`. The layer
/// has no level filter of its own; [`crate::logger::build_subscriber`]
/// attaches one for the configured level.
pub struct RemoteLogLayer {
    dispatcher: Arc<Dispatcher<LogRecord>>,
    service_name: String,
}

impl RemoteLogLayer {
    pub fn new(dispatcher: Arc<Dispatcher<LogRecord>>, service_name: impl Into<String>) -> Self {
        Self {
            dispatcher,
            service_name: service_name.into(),
        }
    }
}

fn is_ignored(target: &str) -> bool {
    IGNORED_TARGETS.iter().any(|ignored| {
        target
            .strip_prefix(ignored)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

impl<S: Subscriber> Layer<S> for RemoteLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_ignored(metadata.target()) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut record = LogRecord::new(Level::from(metadata.level()), visitor.message);
        record.service_name.clone_from(&self.service_name);
        record.trace_id = visitor.trace_id;
        record.span_id = visitor.span_id;
        record.fields = visitor.fields;
        self.dispatcher.record(record);
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    trace_id: Option<String>,
    span_id: Option<String>,
    fields: Map<String, Value>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        match field.name() {
            "message" => self.message = as_string(value),
            "trace_id" => self.trace_id = Some(as_string(value)),
            "span_id" => self.span_id = Some(as_string(value)),
            name => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}

fn as_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::from(format!("{value:?}")));
    }
}
