//! Identity Test Suite: call-site derived ids
//!
//! Test 1: One call site invoked twice shares a pipeline
//! Test 2: Distinct call sites never cancel each other
//! Test 3: #[track_caller] helpers push the capture to their callers

#![cfg(feature = "native")]

use effect_modulation::{effect_id, Effect, EffectId, Event, Subject};
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<i32>>>;

fn record(log: &Log) -> impl FnMut(Event<i32, String>) + Send + 'static {
    let log = Arc::clone(log);
    move |event| {
        if let Event::Output(value) = event {
            log.lock().unwrap_or_else(|p| p.into_inner()).push(value);
        }
    }
}

fn seen(log: &Log) -> Vec<i32> { log.lock().unwrap_or_else(|p| p.into_inner()).clone() }

async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

/// Every caller of this helper lands on the same id.
fn search(source: &Subject<i32, String>) -> Effect<i32, String> {
    source.effect().cancellable(EffectId::here())
}

/// Each caller of this helper gets its own id.
#[track_caller]
fn search_here(source: &Subject<i32, String>) -> Effect<i32, String> {
    source.effect().cancellable(EffectId::here())
}

/// Test 1: One call site invoked twice shares a pipeline
#[tokio::test(start_paused = true)]
async fn same_call_site_shares_pipeline() {
    let first = Subject::new();
    let second = Subject::new();
    let log = Log::default();

    let _owner = search(&first).subscribe(record(&log));
    settle().await;
    first.send(1);
    settle().await;

    let _redirect = search(&second).subscribe(|_| {});
    settle().await;
    first.send(2);
    second.send(3);
    settle().await;

    assert_eq!(seen(&log), vec![1, 3]);
    assert_eq!(first.subscriber_count(), 0);
}

/// Test 2: Distinct call sites never cancel each other
#[tokio::test(start_paused = true)]
async fn distinct_call_sites_run_independently() {
    let left = Subject::<i32, String>::new();
    let right = Subject::<i32, String>::new();
    let left_log = Log::default();
    let right_log = Log::default();

    let _left = left.effect().cancellable(effect_id!()).subscribe(record(&left_log));
    let _right = right.effect().cancellable(effect_id!()).subscribe(record(&right_log));
    settle().await;

    left.send(1);
    right.send(2);
    settle().await;

    assert_eq!(seen(&left_log), vec![1]);
    assert_eq!(seen(&right_log), vec![2]);
    assert_eq!(left.subscriber_count(), 1);
    assert_eq!(right.subscriber_count(), 1);
}

/// Test 3: #[track_caller] helpers push the capture to their callers
#[tokio::test(start_paused = true)]
async fn track_caller_helper_distinguishes_callers() {
    let a = Subject::new();
    let b = Subject::new();
    let a_log = Log::default();
    let b_log = Log::default();

    let _a = search_here(&a).subscribe(record(&a_log));
    let _b = search_here(&b).subscribe(record(&b_log));
    settle().await;
    a.send(1);
    b.send(2);
    settle().await;

    assert_eq!(seen(&a_log), vec![1]);
    assert_eq!(seen(&b_log), vec![2]);
}
