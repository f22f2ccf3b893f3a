// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Senders and configs shared by the integration tests

use async_trait::async_trait;
use remote_telemetry::{BatchSender, Record, SendError, SinkConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Keeps every batch it is given, in delivery order
pub struct RecordingSender<R> {
    batches: Mutex<Vec<Vec<R>>>,
}

impl<R> Default for RecordingSender<R> {
    fn default() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
        }
    }
}

#[allow(dead_code)]
impl<R: Clone> RecordingSender<R> {
    pub fn batches(&self) -> Vec<Vec<R>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }

    pub fn records(&self) -> Vec<R> {
        self.batches().concat()
    }
}

#[async_trait]
impl<R: Record + Clone> BatchSender<R> for RecordingSender<R> {
    async fn send(&self, batch: Vec<R>) -> Result<(), SendError> {
        self.batches.lock().unwrap().push(batch);
        Ok(())
    }
}

/// Fails every send and counts the attempts
#[allow(dead_code)]
#[derive(Default)]
pub struct FailingSender {
    attempts: AtomicUsize,
    records: AtomicUsize,
}

#[allow(dead_code)]
impl FailingSender {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> usize {
        self.records.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<R: Record> BatchSender<R> for FailingSender {
    async fn send(&self, batch: Vec<R>) -> Result<(), SendError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.records.fetch_add(batch.len(), Ordering::SeqCst);
        Err(SendError::Destination(None, "collector unreachable".to_string()))
    }
}

#[allow(dead_code)]
pub fn sink(capacity: usize, interval: Duration) -> SinkConfig {
    SinkConfig {
        enabled: true,
        url: "http://collector.invalid/ingest".to_string(),
        buffer_capacity: capacity,
        flush_interval: interval,
        send_timeout: Duration::from_secs(5),
    }
}
