// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Entry point tying the log and audit sinks together.
//!
//! A [`Telemetry`] owns one [`Dispatcher`] per enabled sink. Disabled sinks
//! own nothing, so recording to them costs a single `Option` check. The
//! handle is meant to be created once and shared (usually as
//! `Arc<Telemetry>`) with everything that records telemetry; [`init`] offers
//! a process-wide instance for code that cannot thread a handle through.

use crate::audit::AuditHelper;
use crate::config::{SinkConfig, TelemetryConfig};
use crate::dispatcher::Dispatcher;
use crate::error::TelemetryError;
use crate::layer::RemoteLogLayer;
use crate::record::{AuditRecord, Level, LogRecord, Record};
use crate::request::TraceContext;
use crate::sender::{BatchSender, HttpSender};
use chrono::Utc;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info};

static GLOBAL: OnceLock<Arc<Telemetry>> = OnceLock::new();

/// Starts the process-wide telemetry instance. Later calls return the
/// instance created by the first call and ignore their configuration.
///
/// Must be called from within a tokio runtime for sinks to start.
pub fn init(config: &TelemetryConfig) -> Arc<Telemetry> {
    if let Some(existing) = GLOBAL.get() {
        debug!("Telemetry already initialized, ignoring new configuration");
        return Arc::clone(existing);
    }
    Arc::clone(GLOBAL.get_or_init(|| Arc::new(Telemetry::start(config))))
}

/// Returns the process-wide instance if [`init`] has been called.
pub fn global() -> Option<Arc<Telemetry>> {
    GLOBAL.get().cloned()
}

pub struct Telemetry {
    service_name: String,
    log: Option<Arc<Dispatcher<LogRecord>>>,
    audit: Option<Arc<Dispatcher<AuditRecord>>>,
}

impl Telemetry {
    /// Starts every enabled sink with an HTTP sender posting to its url.
    pub fn start(config: &TelemetryConfig) -> Self {
        Self::build(
            config,
            || Arc::new(HttpSender::new(&config.log.url, config.log.send_timeout)),
            || Arc::new(HttpSender::new(&config.audit.url, config.audit.send_timeout)),
        )
    }

    /// Starts every enabled sink with the given senders.
    pub fn with_senders(
        config: &TelemetryConfig,
        log_sender: Arc<dyn BatchSender<LogRecord>>,
        audit_sender: Arc<dyn BatchSender<AuditRecord>>,
    ) -> Self {
        Self::build(config, || log_sender, || audit_sender)
    }

    /// A handle with every sink disabled.
    pub fn disabled(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            log: None,
            audit: None,
        }
    }

    fn build(
        config: &TelemetryConfig,
        log_sender: impl FnOnce() -> Arc<dyn BatchSender<LogRecord>>,
        audit_sender: impl FnOnce() -> Arc<dyn BatchSender<AuditRecord>>,
    ) -> Self {
        let log = start_sink(&config.log, "log", config.shutdown_grace, log_sender);
        let audit = start_sink(&config.audit, "audit", config.shutdown_grace, audit_sender);

        info!(
            "Telemetry initialized: {} v{} ({}) [log={}, audit={}]",
            config.service_name,
            config.service_version,
            config.environment,
            log.is_some(),
            audit.is_some()
        );

        Self {
            service_name: config.service_name.clone(),
            log,
            audit,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn is_log_enabled(&self) -> bool {
        self.log.is_some()
    }

    pub fn is_audit_enabled(&self) -> bool {
        self.audit.is_some()
    }

    pub fn log_dispatcher(&self) -> Option<&Arc<Dispatcher<LogRecord>>> {
        self.log.as_ref()
    }

    pub fn audit_dispatcher(&self) -> Option<&Arc<Dispatcher<AuditRecord>>> {
        self.audit.as_ref()
    }

    /// Enqueues a log record. Fills in the service name if it is empty.
    pub fn record_log(&self, mut record: LogRecord) {
        let Some(log) = &self.log else {
            return;
        };
        if record.service_name.is_empty() {
            record.service_name.clone_from(&self.service_name);
        }
        log.record(record);
    }

    pub fn log(&self, level: Level, message: impl Into<String>, trace: &TraceContext) {
        if self.log.is_none() {
            return;
        }
        self.record_log(LogRecord::new(level, message).with_trace(trace));
    }

    /// Enqueues an audit record stamped with the current time and this
    /// service's name.
    pub fn record_audit(&self, mut record: AuditRecord) {
        let Some(audit) = &self.audit else {
            return;
        };
        record.timestamp = Utc::now();
        record.service_name.clone_from(&self.service_name);
        audit.record(record);
    }

    /// Like [`Telemetry::record_audit`], with `duration_ms` measured from `started`.
    pub fn audit_with_duration(&self, mut record: AuditRecord, started: Instant) {
        record.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.record_audit(record);
    }

    /// Starts an audit entry; see [`AuditHelper`].
    pub fn audit(&self) -> AuditHelper<'_> {
        AuditHelper::new(self)
    }

    /// A `tracing` layer forwarding events to the log sink, if it is enabled.
    pub fn log_layer(&self) -> Option<RemoteLogLayer> {
        self.log
            .as_ref()
            .map(|log| RemoteLogLayer::new(Arc::clone(log), self.service_name.clone()))
    }

    /// Shuts down both sinks concurrently. Every enabled sink hands off its
    /// final batch even if `deadline` expires; sends still running at the
    /// deadline are abandoned and reported as [`TelemetryError::ShutdownTimeout`].
    pub async fn close(&self, deadline: Duration) -> Result<(), TelemetryError> {
        info!("Shutting down telemetry");
        let audit = async {
            if let Some(audit) = &self.audit {
                audit.shutdown().await;
            }
        };
        let log = async {
            if let Some(log) = &self.log {
                log.shutdown().await;
            }
        };
        timeout(deadline, async { tokio::join!(audit, log) })
            .await
            .map(|_| ())
            .map_err(|_| TelemetryError::ShutdownTimeout)
    }
}

fn start_sink<R: Record>(
    config: &SinkConfig,
    name: &str,
    shutdown_grace: Duration,
    sender: impl FnOnce() -> Arc<dyn BatchSender<R>>,
) -> Option<Arc<Dispatcher<R>>> {
    if !config.enabled {
        debug!("{} | Sink disabled", R::SINK);
        return None;
    }
    if let Err(e) = config.validate(name) {
        error!("{} | Sink disabled: {e}", R::SINK);
        return None;
    }
    match Dispatcher::new(config, shutdown_grace, sender()) {
        Ok(dispatcher) => {
            info!(
                "{} | Sink enabled [url={}, buffer={}]",
                R::SINK,
                config.url,
                config.buffer_capacity
            );
            Some(Arc::new(dispatcher))
        }
        Err(e) => {
            error!("{} | Failed to start dispatcher, sink disabled: {e}", R::SINK);
            None
        }
    }
}
