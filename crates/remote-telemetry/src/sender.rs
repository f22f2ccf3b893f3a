// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of one batch to a remote collector.
//!
//! Delivery is best-effort on purpose. A batch that fails to serialize, times
//! out, or is answered with a non-2xx status is logged by the dispatcher and
//! dropped: there is no retry, no persistence and no backpressure towards the
//! code producing records. Telemetry must never slow down or fail the request
//! path, and losing a batch while the collector is down is the accepted cost.
//! Do not add retries here without revisiting that trade-off.

use crate::error::SendError;
use crate::http::get_client;
use crate::record::Record;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Ships one batch. Every call only touches its own batch, so sends for
/// different flushes can run concurrently.
#[async_trait]
pub trait BatchSender<R: Record>: Send + Sync {
    async fn send(&self, batch: Vec<R>) -> Result<(), SendError>;
}

/// Serializes a batch as `{"<payload key>": [records...]}`.
pub fn encode<R: Record>(batch: &[R]) -> Result<Vec<u8>, SendError> {
    let payload = HashMap::from([(R::PAYLOAD_KEY, batch)]);
    serde_json::to_vec(&payload).map_err(|e| SendError::Payload(e.to_string()))
}

/// Posts JSON batches to a collector URL.
#[derive(Debug, Clone)]
pub struct HttpSender {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpSender {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self::with_client(get_client(timeout), url, timeout)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl<R: Record> BatchSender<R> for HttpSender {
    async fn send(&self, batch: Vec<R>) -> Result<(), SendError> {
        let body = encode(&batch)?;
        let started = Instant::now();

        let resp = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(body)
            .send()
            .await
            .map_err(|e| SendError::Destination(e.status(), e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            debug!(
                "{} | Shipped {} records in {} ms",
                R::SINK,
                batch.len(),
                started.elapsed().as_millis()
            );
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(SendError::Destination(Some(status), body))
    }
}
