// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Buffered, non-blocking delivery of structured logs and audit entries to
//! remote HTTP collectors.
//!
//! Each sink (logs, audit) gets its own [`Dispatcher`], which buffers records
//! in memory and ships them in JSON batches when the buffer fills, when its
//! flush interval elapses, or at shutdown. Recording never waits on the
//! network.
//!
//! ```rust,ignore
//! use remote_telemetry::{logger, Telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env()?;
//! let telemetry = remote_telemetry::init(&config);
//! logger::init_subscriber(&config.log_level, telemetry.log_layer())?;
//!
//! telemetry
//!     .audit()
//!     .with_action("delete")
//!     .with_resource("user")
//!     .with_user("42", "alice")
//!     .success();
//!
//! telemetry.close(std::time::Duration::from_secs(5)).await?;
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod audit;
pub mod buffer;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod layer;
pub mod logger;
pub mod record;
pub mod request;
pub mod sender;
pub mod telemetry;

pub use audit::AuditHelper;
pub use config::{SinkConfig, TelemetryConfig};
pub use dispatcher::{Dispatcher, DispatcherState};
pub use error::{SendError, TelemetryError};
pub use layer::RemoteLogLayer;
pub use record::{AuditRecord, Level, LogRecord, Record};
pub use request::{RequestMeta, TraceContext};
pub use sender::{BatchSender, HttpSender};
pub use telemetry::{global, init, Telemetry};
