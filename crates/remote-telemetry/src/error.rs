// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// Errors raised while configuring, starting or stopping telemetry sinks.
///
/// None of these ever reach the code that records telemetry; they are only
/// returned from setup and teardown calls.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No tokio runtime available to run the flush loop")]
    NoRuntime,

    #[error("Shutdown timeout exceeded")]
    ShutdownTimeout,

    #[error("Failed to initialize logging: {0}")]
    LoggerInit(String),
}

/// Failure to deliver one batch. Logged by the dispatcher and then dropped.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The batch could not be turned into a request body.
    #[error("Failed to prepare payload: {0}")]
    Payload(String),

    /// Transport error, timeout, or a non-success status from the collector.
    #[error("Error shipping data: {0:?} {1}")]
    Destination(Option<StatusCode>, String),
}

/// Returned by [`crate::buffer::Buffer::append`] once the final snapshot has been taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("buffer is closed")]
pub struct BufferClosed;
