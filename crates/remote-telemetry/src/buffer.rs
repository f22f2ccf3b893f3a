// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::BufferClosed;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct Inner<R> {
    records: Vec<R>,
    closed: bool,
}

/// Ordered, mutex-guarded holding area for records waiting to be flushed.
///
/// Appends always succeed until the buffer is closed; reaching `capacity`
/// only tells the caller to flush now. A snapshot takes every buffered
/// record and leaves the buffer empty under the same lock, so no record can
/// end up in two snapshots.
#[derive(Debug)]
pub struct Buffer<R> {
    inner: Mutex<Inner<R>>,
    capacity: usize,
}

impl<R> Buffer<R> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                records: Vec::with_capacity(capacity),
                closed: false,
            }),
            capacity,
        }
    }

    /// Appends a record. Returns `Ok(true)` when the buffer has reached its
    /// capacity and should be flushed immediately.
    pub fn append(&self, record: R) -> Result<bool, BufferClosed> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(BufferClosed);
        }
        inner.records.push(record);
        Ok(inner.records.len() >= self.capacity)
    }

    /// Takes every buffered record in append order and resets the buffer.
    pub fn snapshot(&self) -> Vec<R> {
        let mut inner = self.lock();
        std::mem::replace(&mut inner.records, Vec::with_capacity(self.capacity))
    }

    /// Takes the final snapshot. Later appends are rejected with [`BufferClosed`].
    pub fn close(&self) -> Vec<R> {
        let mut inner = self.lock();
        inner.closed = true;
        std::mem::take(&mut inner.records)
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // A panic while holding the lock cannot leave the Vec half-written, so
    // the data is still usable.
    fn lock(&self) -> MutexGuard<'_, Inner<R>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
