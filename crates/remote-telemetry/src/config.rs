// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::TelemetryError;
use std::env;
use std::time::Duration;

pub const DEFAULT_BUFFER_CAPACITY: usize = 100;
pub const DEFAULT_LOG_FLUSH_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_AUDIT_FLUSH_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Settings for one telemetry destination (the log sink or the audit sink).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    /// Disabled sinks start no dispatcher; recording to them is a no-op.
    pub enabled: bool,
    /// Collector endpoint receiving the JSON POSTs
    pub url: String,
    /// Number of buffered records that triggers an immediate flush
    pub buffer_capacity: usize,
    /// Period of the routine flush
    pub flush_interval: Duration,
    /// Deadline applied to every outbound send
    pub send_timeout: Duration,
}

impl SinkConfig {
    pub fn log_defaults() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            flush_interval: DEFAULT_LOG_FLUSH_INTERVAL,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn audit_defaults() -> Self {
        Self {
            flush_interval: DEFAULT_AUDIT_FLUSH_INTERVAL,
            ..Self::log_defaults()
        }
    }

    /// Checks the settings that the dispatcher relies on. Disabled sinks
    /// are not checked since they never start.
    pub fn validate(&self, sink: &str) -> Result<(), TelemetryError> {
        if !self.enabled {
            return Ok(());
        }
        if self.url.trim().is_empty() {
            return Err(TelemetryError::InvalidConfig(format!(
                "{sink} sink is enabled but has no url"
            )));
        }
        if self.buffer_capacity == 0 {
            return Err(TelemetryError::InvalidConfig(format!(
                "{sink} buffer capacity must be greater than 0"
            )));
        }
        if self.flush_interval.is_zero() {
            return Err(TelemetryError::InvalidConfig(format!(
                "{sink} flush interval must be greater than 0"
            )));
        }
        if self.send_timeout.is_zero() {
            return Err(TelemetryError::InvalidConfig(format!(
                "{sink} send timeout must be greater than 0"
            )));
        }
        Ok(())
    }
}

/// Configuration for the whole telemetry facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub service_version: String,
    /// Deployment environment, e.g. dev, test, prod
    pub environment: String,
    /// Level for the local diagnostic subscriber (trace, debug, info, warn, error)
    pub log_level: String,
    pub log: SinkConfig,
    pub audit: SinkConfig,
    /// How long shutdown waits for in-flight sends before abandoning them
    pub shutdown_grace: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown_service".to_string(),
            service_version: "1.0.0".to_string(),
            environment: "dev".to_string(),
            log_level: "info".to_string(),
            log: SinkConfig::log_defaults(),
            audit: SinkConfig::audit_defaults(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from `TELEMETRY_*` environment variables.
    /// Values that fail to parse keep their defaults.
    pub fn from_env() -> Result<Self, TelemetryError> {
        let defaults = Self::default();

        let log = SinkConfig {
            enabled: env_bool("TELEMETRY_LOG_REMOTE_ENABLED").unwrap_or(defaults.log.enabled),
            url: env::var("TELEMETRY_LOG_REMOTE_URL").unwrap_or(defaults.log.url),
            buffer_capacity: env_parse("TELEMETRY_LOG_REMOTE_BATCH")
                .unwrap_or(defaults.log.buffer_capacity),
            flush_interval: env_parse("TELEMETRY_LOG_FLUSH_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.log.flush_interval),
            send_timeout: env_parse("TELEMETRY_LOG_REMOTE_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.log.send_timeout),
        };

        let audit = SinkConfig {
            enabled: env_bool("TELEMETRY_AUDIT_ENABLED").unwrap_or(defaults.audit.enabled),
            url: env::var("TELEMETRY_AUDIT_URL").unwrap_or(defaults.audit.url),
            buffer_capacity: env_parse("TELEMETRY_AUDIT_BUFFER")
                .unwrap_or(defaults.audit.buffer_capacity),
            flush_interval: env_parse("TELEMETRY_AUDIT_FLUSH_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.audit.flush_interval),
            send_timeout: env_parse("TELEMETRY_AUDIT_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.audit.send_timeout),
        };

        let config = Self {
            service_name: env::var("TELEMETRY_SERVICE_NAME").unwrap_or(defaults.service_name),
            service_version: env::var("TELEMETRY_SERVICE_VERSION")
                .unwrap_or(defaults.service_version),
            environment: env::var("TELEMETRY_ENVIRONMENT").unwrap_or(defaults.environment),
            log_level: env::var("TELEMETRY_LOG_LEVEL")
                .map(|val| val.to_lowercase())
                .unwrap_or(defaults.log_level),
            log,
            audit,
            shutdown_grace: env_parse("TELEMETRY_SHUTDOWN_GRACE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.shutdown_grace),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), TelemetryError> {
        if self.service_name.trim().is_empty() {
            return Err(TelemetryError::InvalidConfig(
                "service name cannot be empty".to_string(),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(TelemetryError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        self.log.validate("log")?;
        self.audit.validate("audit")
    }
}

fn env_bool(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|val| matches!(val.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|val| val.trim().parse::<T>().ok())
}
