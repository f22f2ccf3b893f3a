// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::record::AuditRecord;
use crate::request::{RequestMeta, TraceContext};
use crate::telemetry::Telemetry;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;
use std::time::Instant;
use tracing::warn;

/// Builder for one audit entry.
///
/// The clock starts when the helper is created; `success`, `fail` and
/// `finish` stamp the elapsed time as `duration_ms` and enqueue the entry.
/// When the audit sink is disabled the helper still works but skips
/// serializing `before`/`after` payloads, and nothing is sent.
#[must_use = "an audit entry is only recorded by success(), fail() or finish()"]
pub struct AuditHelper<'a> {
    telemetry: &'a Telemetry,
    record: AuditRecord,
    started: Instant,
}

impl<'a> AuditHelper<'a> {
    pub(crate) fn new(telemetry: &'a Telemetry) -> Self {
        Self {
            telemetry,
            record: AuditRecord::default(),
            started: Instant::now(),
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.record.action = action.into();
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.record.resource = resource.into();
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>, username: impl Into<String>) -> Self {
        self.record.user_id = Some(user_id.into());
        self.record.username = Some(username.into());
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.record.ip = Some(ip.into());
        self
    }

    /// Copies method, path and client address from the request.
    pub fn with_request(mut self, request: &RequestMeta) -> Self {
        self.record.apply_request(request);
        self
    }

    pub fn with_trace(mut self, trace: &TraceContext) -> Self {
        self.record.trace_id.clone_from(&trace.trace_id);
        self
    }

    pub fn with_before<T: Serialize>(mut self, before: T) -> Self {
        self.record.before = self.to_value("before", before);
        self
    }

    pub fn with_after<T: Serialize>(mut self, after: T) -> Self {
        self.record.after = self.to_value("after", after);
        self
    }

    pub fn with_extra<T: Serialize>(mut self, key: impl Into<String>, value: T) -> Self {
        let key = key.into();
        if let Some(value) = self.to_value(&key, value) {
            self.record.extra.insert(key, value);
        }
        self
    }

    pub fn success(mut self) {
        self.record.success = true;
        self.record.error = None;
        self.submit();
    }

    pub fn fail(mut self, err: impl Display) {
        self.record.success = false;
        self.record.error = Some(err.to_string());
        self.submit();
    }

    /// Records success for `Ok` and failure for `Err`.
    pub fn finish<T, E: Display>(self, result: &Result<T, E>) {
        match result {
            Ok(_) => self.success(),
            Err(e) => self.fail(e),
        }
    }

    fn submit(self) {
        self.telemetry
            .audit_with_duration(self.record, self.started);
    }

    fn to_value<T: Serialize>(&self, field: &str, value: T) -> Option<Value> {
        if !self.telemetry.is_audit_enabled() {
            return None;
        }
        match serde_json::to_value(value) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("AUDIT | Skipping field '{field}': {e}");
                None
            }
        }
    }
}
