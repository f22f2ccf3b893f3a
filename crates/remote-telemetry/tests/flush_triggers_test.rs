// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Size, timer and shutdown flush triggers observed through a recording sender

mod common;

use common::{sink, FailingSender, RecordingSender};
use remote_telemetry::{Dispatcher, DispatcherState, Level, LogRecord};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

const GRACE: Duration = Duration::from_millis(100);

fn log(i: usize) -> LogRecord {
    LogRecord::new(Level::Info, format!("event {i}"))
}

fn messages(records: &[LogRecord]) -> Vec<String> {
    records.iter().map(|r| r.message.clone()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_timer_flushes_partial_buffer() {
    let sender = Arc::new(RecordingSender::<LogRecord>::default());
    let dispatcher = Dispatcher::<LogRecord>::new(
        &sink(100, Duration::from_millis(50)),
        GRACE,
        sender.clone(),
    )
    .unwrap();

    for i in 0..3 {
        dispatcher.record(log(i));
    }
    sleep(Duration::from_millis(60)).await;

    assert_eq!(sender.batch_sizes(), vec![3]);
    assert_eq!(messages(&sender.records()), vec!["event 0", "event 1", "event 2"]);
    assert_eq!(dispatcher.buffered(), 0);

    dispatcher.shutdown().await;
    assert_eq!(sender.batch_sizes(), vec![3]);
}

#[tokio::test(start_paused = true)]
async fn test_size_threshold_flushes_without_waiting_for_timer() {
    let sender = Arc::new(RecordingSender::<LogRecord>::default());
    let dispatcher = Dispatcher::<LogRecord>::new(
        &sink(100, Duration::from_secs(10)),
        GRACE,
        sender.clone(),
    )
    .unwrap();

    for i in 0..150 {
        dispatcher.record(log(i));
    }
    assert_eq!(dispatcher.buffered(), 50);

    sleep(Duration::from_millis(1)).await;
    assert_eq!(sender.batch_sizes(), vec![100]);

    dispatcher.shutdown().await;
    assert_eq!(sender.batch_sizes(), vec![100, 50]);

    let expected: Vec<String> = (0..150).map(|i| format!("event {i}")).collect();
    assert_eq!(messages(&sender.records()), expected);
}

#[tokio::test(start_paused = true)]
async fn test_failing_sender_drops_batches_and_keeps_accepting() {
    let sender = Arc::new(FailingSender::default());
    let dispatcher = Dispatcher::<LogRecord>::new(
        &sink(4, Duration::from_millis(50)),
        GRACE,
        sender.clone(),
    )
    .unwrap();

    for i in 0..10 {
        dispatcher.record(log(i));
    }
    sleep(Duration::from_millis(60)).await;

    // two full batches plus the timer flush of the remaining two
    assert_eq!(sender.attempts(), 3);
    assert_eq!(sender.records(), 10);
    assert_eq!(dispatcher.buffered(), 0);

    dispatcher.record(log(10));
    dispatcher.shutdown().await;
    assert_eq!(sender.attempts(), 4);
    assert_eq!(dispatcher.state(), DispatcherState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_delivers_buffered_records() {
    let sender = Arc::new(RecordingSender::<LogRecord>::default());
    let dispatcher = Dispatcher::<LogRecord>::new(
        &sink(100, Duration::from_secs(60)),
        GRACE,
        sender.clone(),
    )
    .unwrap();

    for i in 0..5 {
        dispatcher.record(log(i));
    }
    assert!(sender.batches().is_empty());

    dispatcher.shutdown().await;

    assert_eq!(sender.batch_sizes(), vec![5]);
    assert_eq!(dispatcher.state(), DispatcherState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_records_after_shutdown_are_dropped() {
    let sender = Arc::new(RecordingSender::<LogRecord>::default());
    let dispatcher = Dispatcher::<LogRecord>::new(
        &sink(1, Duration::from_millis(10)),
        GRACE,
        sender.clone(),
    )
    .unwrap();

    dispatcher.shutdown().await;
    dispatcher.record(log(0));
    sleep(Duration::from_millis(100)).await;

    assert!(sender.batches().is_empty());
    assert_eq!(dispatcher.buffered(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_empty_ticks_send_nothing() {
    let sender = Arc::new(RecordingSender::<LogRecord>::default());
    let dispatcher = Dispatcher::<LogRecord>::new(
        &sink(10, Duration::from_millis(20)),
        GRACE,
        sender.clone(),
    )
    .unwrap();

    sleep(Duration::from_millis(200)).await;
    dispatcher.shutdown().await;

    assert!(sender.batches().is_empty());
}
