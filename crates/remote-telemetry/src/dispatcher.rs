// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-sink buffering and flushing.
//!
//! ```text
//!   producers ──record()──> Buffer ──snapshot──> send task ──> BatchSender
//!                             ^                     (TaskTracker)
//!                             │
//!         flush loop: interval tick │ size threshold │ shutdown
//! ```
//!
//! A flush happens on three triggers:
//! - **size**: the append that brings the buffer to capacity snapshots it
//!   right away, on the producer's thread, bounding memory under bursts
//! - **timer**: the background loop flushes whatever is buffered on every
//!   tick, bounding staleness under low load
//! - **shutdown**: a final snapshot closes the buffer
//!
//! Flushing never waits for delivery. The snapshot is moved into a new task
//! owned by the sink's `TaskTracker`, so several sends may be in flight at
//! once and a hung collector only ever stalls its own send. Shutdown joins
//! the tracker for a bounded grace period and abandons whatever is still
//! running after that.

use crate::buffer::Buffer;
use crate::config::SinkConfig;
use crate::error::{BufferClosed, TelemetryError};
use crate::record::Record;
use crate::sender::BatchSender;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

const RUNNING: u8 = 0;
const DRAINING: u8 = 1;
const STOPPED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Accepting records and flushing on size and timer.
    Running,
    /// Shutdown requested; final flush and grace period in progress.
    Draining,
    /// Shutdown finished. Further records are dropped.
    Stopped,
}

/// State shared by the dispatcher handle, the flush loop and producers.
struct Shared<R: Record> {
    buffer: Buffer<R>,
    sender: Arc<dyn BatchSender<R>>,
    tasks: TaskTracker,
    runtime: Handle,
}

impl<R: Record> Shared<R> {
    fn flush(&self) -> usize {
        let batch = self.buffer.snapshot();
        self.hand_off(batch)
    }

    fn final_flush(&self) -> usize {
        let batch = self.buffer.close();
        self.hand_off(batch)
    }

    /// Moves the batch into its own send task. Returns the number of records
    /// handed off; empty batches spawn nothing.
    fn hand_off(&self, batch: Vec<R>) -> usize {
        let count = batch.len();
        if count == 0 {
            return 0;
        }

        let sender = Arc::clone(&self.sender);
        self.tasks.spawn_on(
            async move {
                if let Err(e) = sender.send(batch).await {
                    error!("{} | Dropping batch of {count} records: {e}", R::SINK);
                }
            },
            &self.runtime,
        );
        count
    }
}

/// Buffers records for one sink and ships them in batches.
///
/// `record` is safe to call from any thread, including threads that are not
/// part of the tokio runtime: the runtime handle captured at construction is
/// used to spawn send tasks.
pub struct Dispatcher<R: Record> {
    shared: Arc<Shared<R>>,
    cancel_token: CancellationToken,
    flush_loop: Mutex<Option<JoinHandle<()>>>,
    state: AtomicU8,
    shutdown_grace: Duration,
}

impl<R: Record> Dispatcher<R> {
    /// Starts the flush loop on the current tokio runtime.
    ///
    /// Only `buffer_capacity` and `flush_interval` are read from `config`;
    /// the destination is whatever `sender` delivers to.
    pub fn new(
        config: &SinkConfig,
        shutdown_grace: Duration,
        sender: Arc<dyn BatchSender<R>>,
    ) -> Result<Self, TelemetryError> {
        if config.buffer_capacity == 0 {
            return Err(TelemetryError::InvalidConfig(format!(
                "{} buffer capacity must be greater than 0",
                R::SINK
            )));
        }
        if config.flush_interval.is_zero() {
            return Err(TelemetryError::InvalidConfig(format!(
                "{} flush interval must be greater than 0",
                R::SINK
            )));
        }
        let runtime = Handle::try_current().map_err(|_| TelemetryError::NoRuntime)?;

        let shared = Arc::new(Shared {
            buffer: Buffer::new(config.buffer_capacity),
            sender,
            tasks: TaskTracker::new(),
            runtime: runtime.clone(),
        });
        let cancel_token = CancellationToken::new();
        let flush_loop = runtime.spawn(run_flush_loop(
            Arc::clone(&shared),
            config.flush_interval,
            cancel_token.clone(),
        ));

        debug!(
            "{} | Dispatcher started [capacity={}, interval={:?}]",
            R::SINK,
            config.buffer_capacity,
            config.flush_interval
        );

        Ok(Self {
            shared,
            cancel_token,
            flush_loop: Mutex::new(Some(flush_loop)),
            state: AtomicU8::new(RUNNING),
            shutdown_grace,
        })
    }

    /// Appends a record. Never blocks on I/O and never fails; if the append
    /// fills the buffer, the buffer is flushed before returning.
    pub fn record(&self, record: R) {
        match self.shared.buffer.append(record) {
            Ok(true) => {
                let count = self.shared.flush();
                debug!("{} | Buffer full, flushed {count} records", R::SINK);
            }
            Ok(false) => {}
            Err(BufferClosed) => {
                debug!("{} | Dispatcher is shut down, dropping record", R::SINK);
            }
        }
    }

    /// Hands the current buffer contents to the sender without waiting for
    /// delivery. Returns the number of records handed off.
    pub fn flush(&self) -> usize {
        self.shared.flush()
    }

    /// Stops the flush loop, hands the remaining records to the sender, and
    /// waits up to the grace period for in-flight sends. Later calls return
    /// immediately.
    ///
    /// The final batch is handed off on the first poll, before anything is
    /// awaited, so dropping this future early (e.g. under a timeout) still
    /// flushes the buffer and leaves the dispatcher `Stopped`.
    pub async fn shutdown(&self) {
        if self
            .state
            .compare_exchange(RUNNING, DRAINING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("{} | Shutdown already requested", R::SINK);
            return;
        }
        let _stopped = StopOnDrop {
            state: &self.state,
            sink: R::SINK,
        };

        self.cancel_token.cancel();
        let count = self.shared.final_flush();
        debug!("{} | Final flush handed off {count} records", R::SINK);

        let flush_loop = self
            .flush_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(flush_loop) = flush_loop {
            if let Err(e) = flush_loop.await {
                error!("{} | Flush loop ended abnormally: {e}", R::SINK);
            }
        }

        self.shared.tasks.close();
        if timeout(self.shutdown_grace, self.shared.tasks.wait())
            .await
            .is_err()
        {
            warn!(
                "{} | Abandoning {} in-flight sends after {:?}",
                R::SINK,
                self.shared.tasks.len(),
                self.shutdown_grace
            );
        }
    }

    pub fn state(&self) -> DispatcherState {
        match self.state.load(Ordering::Acquire) {
            RUNNING => DispatcherState::Running,
            DRAINING => DispatcherState::Draining,
            _ => DispatcherState::Stopped,
        }
    }

    /// Number of records currently buffered.
    pub fn buffered(&self) -> usize {
        self.shared.buffer.len()
    }

    /// Number of sends that have not completed yet.
    pub fn in_flight(&self) -> usize {
        self.shared.tasks.len()
    }
}

/// Marks the dispatcher stopped once shutdown finishes or is abandoned.
struct StopOnDrop<'a> {
    state: &'a AtomicU8,
    sink: &'static str,
}

impl Drop for StopOnDrop<'_> {
    fn drop(&mut self) {
        self.state.store(STOPPED, Ordering::Release);
        debug!("{} | Dispatcher stopped", self.sink);
    }
}

impl<R: Record> Drop for Dispatcher<R> {
    fn drop(&mut self) {
        // Lets the loop hand off the last batch if shutdown was never called
        self.cancel_token.cancel();
    }
}

async fn run_flush_loop<R: Record>(
    shared: Arc<Shared<R>>,
    period: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // discard first tick, which is instantaneous

    loop {
        tokio::select! {
            biased;
            () = cancel_token.cancelled() => {
                // Already empty when shutdown() ran; not when the handle was dropped
                let count = shared.final_flush();
                if count > 0 {
                    debug!("{} | Final flush handed off {count} records", R::SINK);
                }
                break;
            }
            _ = ticker.tick() => {
                let count = shared.flush();
                if count > 0 {
                    debug!("{} | Periodic flush handed off {count} records", R::SINK);
                }
            }
        }
    }
}
