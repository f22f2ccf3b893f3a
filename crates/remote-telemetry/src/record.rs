// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Telemetry records shipped to remote collectors.
//!
//! Records are built at the call site and never mutated once appended to a
//! dispatcher buffer. Each record type knows the JSON key its batches are
//! wrapped in, so one dispatcher implementation serves both sinks.

use crate::request::{RequestMeta, TraceContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A value that can be buffered and shipped by a [`crate::dispatcher::Dispatcher`].
pub trait Record: Serialize + Send + Sync + 'static {
    /// Top-level key of the JSON object carrying a batch, e.g. `{"logs": [...]}`.
    const PAYLOAD_KEY: &'static str;
    /// Prefix for this sink's diagnostics.
    const SINK: &'static str;
}

pub mod action {
    pub const CREATE: &str = "create";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
    pub const QUERY: &str = "query";
    pub const LOGIN: &str = "login";
    pub const LOGOUT: &str = "logout";
    pub const EXPORT: &str = "export";
    pub const IMPORT: &str = "import";
}

pub mod resource {
    pub const CATEGORY: &str = "category";
    pub const USER: &str = "user";
    pub const ROLE: &str = "role";
    pub const CONFIG: &str = "config";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// One application log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Unix timestamp in seconds
    pub timestamp: i64,
    pub level: Level,
    pub message: String,
    pub service_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

impl LogRecord {
    /// Creates a record stamped with the current time. The service name is
    /// filled in by the facade when the record is enqueued.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now().timestamp(),
            level,
            message: message.into(),
            service_name: String::new(),
            trace_id: None,
            span_id: None,
            fields: Map::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_trace(mut self, trace: &TraceContext) -> Self {
        self.trace_id.clone_from(&trace.trace_id);
        self.span_id.clone_from(&trace.span_id);
        self
    }
}

impl Record for LogRecord {
    const PAYLOAD_KEY: &'static str = "logs";
    const SINK: &'static str = "LOGS";
}

/// One audit trail entry describing an operation performed on a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub service_name: String,

    pub action: String,
    pub resource: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    /// State of the resource before the operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,
    /// State of the resource after the operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,

    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl AuditRecord {
    pub fn new(action: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            service_name: String::new(),
            action: action.into(),
            resource: resource.into(),
            user_id: None,
            username: None,
            ip: None,
            method: None,
            path: None,
            trace_id: None,
            before: None,
            after: None,
            success: false,
            error: None,
            duration_ms: 0,
            extra: Map::new(),
        }
    }

    pub(crate) fn apply_request(&mut self, request: &RequestMeta) {
        self.method = Some(request.method.clone());
        self.path = Some(request.path.clone());
        if let Some(ip) = request.client_ip() {
            self.ip = Some(ip);
        }
    }
}

impl Default for AuditRecord {
    fn default() -> Self {
        Self::new(String::new(), String::new())
    }
}

impl Record for AuditRecord {
    const PAYLOAD_KEY: &'static str = "audit_logs";
    const SINK: &'static str = "AUDIT";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_level_from_tracing() {
        assert_eq!(Level::from(&tracing::Level::TRACE), Level::Trace);
        assert_eq!(Level::from(&tracing::Level::WARN), Level::Warn);
        assert_eq!(Level::from(&tracing::Level::ERROR), Level::Error);
        assert_eq!(Level::Fatal.to_string(), "fatal");
    }

    #[test]
    fn test_log_record_omits_empty_optionals() {
        let mut record = LogRecord::new(Level::Info, "user created");
        record.timestamp = 1_700_000_000;
        record.service_name = "orders-api".to_string();

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "timestamp": 1_700_000_000,
                "level": "info",
                "message": "user created",
                "service_name": "orders-api",
            })
        );
    }

    #[test]
    fn test_log_record_with_trace_and_fields() {
        let trace = TraceContext {
            trace_id: Some("4bf92f3577b34da6a3ce929d0e0e4736".to_string()),
            span_id: Some("00f067aa0ba902b7".to_string()),
        };
        let record = LogRecord::new(Level::Error, "query failed")
            .with_trace(&trace)
            .with_field("table", "orders")
            .with_field("attempt", 2);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["level"], "error");
        assert_eq!(value["trace_id"], "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(value["span_id"], "00f067aa0ba902b7");
        assert_eq!(value["fields"], json!({"attempt": 2, "table": "orders"}));
    }

    #[test]
    fn test_audit_record_always_carries_success() {
        let record = AuditRecord::new(action::DELETE, resource::USER);
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["success"], false);
        assert_eq!(value["duration_ms"], 0);
        assert_eq!(value["action"], "delete");
        assert_eq!(value["resource"], "user");
        assert!(value.get("error").is_none());
        assert!(value.get("before").is_none());
        assert!(value.get("extra").is_none());
        assert!(value["timestamp"].as_str().is_some());
    }

    #[test]
    fn test_audit_record_apply_request() {
        let mut record = AuditRecord::default();
        let request = RequestMeta::new("PUT", "/api/v1/roles/7", "10.0.0.9:41000");
        record.apply_request(&request);

        assert_eq!(record.method.as_deref(), Some("PUT"));
        assert_eq!(record.path.as_deref(), Some("/api/v1/roles/7"));
        assert_eq!(record.ip.as_deref(), Some("10.0.0.9:41000"));
    }

    #[test]
    fn test_payload_keys() {
        assert_eq!(LogRecord::PAYLOAD_KEY, "logs");
        assert_eq!(AuditRecord::PAYLOAD_KEY, "audit_logs");
    }
}
