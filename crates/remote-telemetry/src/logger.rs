// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Local diagnostic output.
//!
//! Lines look like:
//! ```text
//! TELEMETRY | WARN | LOGS | Abandoning 2 in-flight sends after 100ms
//! ```

use crate::error::TelemetryError;
use crate::layer::RemoteLogLayer;
use std::fmt;
use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext, FormattedFields,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

/// Prefixes every line with `TELEMETRY` and the level, followed by the
/// active spans from root to leaf.
#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(&mut writer, "TELEMETRY | {} | ", event.metadata().level())?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;

                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Directives applied to each output layer. Transport crates are silenced,
/// everything else logs at `level`.
pub fn env_filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(format!("h2=off,hyper=off,rustls=off,{level}"))
        .map_err(|e| TelemetryError::LoggerInit(e.to_string()))
}

/// Builds the subscriber: formatted output on stdout plus `remote` when the
/// log sink is enabled. Both layers are filtered at `level`, so events below
/// it are neither printed nor shipped.
pub fn build_subscriber(
    level: &str,
    remote: Option<RemoteLogLayer>,
) -> Result<impl Subscriber + Send + Sync + 'static, TelemetryError> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .event_format(Formatter)
        .with_filter(env_filter(level)?);
    let remote = remote
        .map(|layer| env_filter(level).map(|filter| layer.with_filter(filter)))
        .transpose()?;

    Ok(tracing_subscriber::registry().with(fmt_layer).with(remote))
}

/// Installs [`build_subscriber`] as the global default.
pub fn init_subscriber(level: &str, remote: Option<RemoteLogLayer>) -> Result<(), TelemetryError> {
    tracing::subscriber::set_global_default(build_subscriber(level, remote)?)
        .map_err(|e| TelemetryError::LoggerInit(e.to_string()))
}
