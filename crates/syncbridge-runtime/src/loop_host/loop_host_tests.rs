#![allow(non_snake_case)]

use std::time::{Duration, Instant};

use super::*;

fn test_host() -> LoopHost {
    LoopHost::new(
        SynchronizerConfig::named("test").with_shutdown_grace_ms(500),
        None,
    )
}

#[test]
fn LoopHost___new___is_inert_until_first_use() {
    let host = test_host();

    assert_eq!(host.state(), BridgeState::Inert);
    assert_eq!(host.task_count(), 0);
}

#[test]
fn LoopHost___run_blocking___returns_value_and_starts_loop() {
    let host = test_host();

    let result = host.run_blocking(async { 6 * 7 });

    assert_eq!(result.unwrap(), 42);
    assert_eq!(host.state(), BridgeState::Running);
}

#[test]
fn LoopHost___run_blocking___user_errors_pass_through_as_values() {
    let host = test_host();

    let result = host.run_blocking(async { Err::<i32, String>("boom".to_string()) });

    assert_eq!(result.unwrap(), Err("boom".to_string()));
}

#[test]
fn LoopHost___run_blocking___panic_becomes_panicked_error() {
    let host = test_host();

    let result: BridgeResult<()> = host.run_blocking(async { panic!("kaboom") });

    match result {
        Err(BridgeError::Panicked(msg)) => assert!(msg.contains("kaboom")),
        other => panic!("expected Panicked, got {other:?}"),
    }
}

#[test]
fn LoopHost___run_blocking___from_loop_thread_is_rejected() {
    let host = test_host();
    let inner_host = host.clone();

    let inner = host
        .run_blocking(async move { inner_host.run_blocking(async { 1 }) })
        .unwrap();

    assert!(matches!(inner, Err(BridgeError::WouldDeadlock)));
}

#[test]
fn LoopHost___run_blocking___user_future_runs_on_loop_thread_only() {
    let host = test_host();
    let caller = std::thread::current().id();

    let task_thread = host
        .run_blocking(async move { std::thread::current().id() })
        .unwrap();

    assert_ne!(task_thread, caller);
    let again = host
        .run_blocking(async move { std::thread::current().id() })
        .unwrap();
    assert_eq!(task_thread, again);
}

#[test]
fn LoopHost___schedule___dispatches_in_parallel() {
    let host = test_host();
    let started = Instant::now();

    let calls: Vec<_> = (0..4)
        .map(|i| {
            host.schedule(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                i * i
            })
            .unwrap()
        })
        .collect();
    let results: Vec<i32> = calls.into_iter().map(|c| c.result().unwrap()).collect();

    assert_eq!(results, vec![0, 1, 4, 9]);
    assert!(started.elapsed() < Duration::from_millis(150));
}

#[test]
fn LoopHost___shutdown___then_submit_fails_closed() {
    let host = test_host();
    host.run_blocking(async {}).unwrap();

    host.shutdown().unwrap();
    let result = host.run_blocking(async { 1 });

    assert!(matches!(result, Err(BridgeError::Closed { .. })));
    assert_eq!(host.state(), BridgeState::Stopped);
}

#[test]
fn LoopHost___shutdown___before_first_use_goes_straight_to_stopped() {
    let host = test_host();

    host.shutdown().unwrap();

    assert_eq!(host.state(), BridgeState::Stopped);
}

#[test]
fn LoopHost___shutdown___is_idempotent() {
    let host = test_host();
    host.run_blocking(async {}).unwrap();

    host.shutdown().unwrap();
    host.shutdown().unwrap();

    assert_eq!(host.state(), BridgeState::Stopped);
}

#[test]
fn LoopHost___shutdown___cancels_inflight_tasks() {
    let host = test_host();
    let call = host
        .schedule(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        })
        .unwrap();

    host.shutdown().unwrap();

    let result = call.result();
    assert!(result.is_err());
    let err = result.unwrap_err();
    assert!(err.is_cancellation() || err.is_shutdown(), "got {err:?}");
}

#[test]
fn LoopHost___interrupt___releases_blocking_call_as_interrupted() {
    let host = test_host();
    host.run_blocking(async {}).unwrap();
    let worker_host = host.clone();

    let worker = std::thread::spawn(move || {
        worker_host.run_blocking(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        })
    });
    // wait for the call to arrive on the loop before firing
    let deadline = Instant::now() + Duration::from_secs(5);
    while host.task_count() == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }

    let hit = host.interrupt();
    let result = worker.join().unwrap();

    assert_eq!(hit, 1);
    assert!(matches!(result, Err(BridgeError::Interrupted)));
    assert_eq!(host.state(), BridgeState::Running);
}

#[test]
fn LoopHost___task_count___returns_to_zero_after_completion() {
    let host = test_host();

    host.run_blocking(async {}).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while host.task_count() != 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(host.task_count(), 0);
}

#[test]
fn LoopHost___clone___shares_the_same_loop() {
    let host = test_host();
    let other = host.clone();

    let first = host
        .run_blocking(async { std::thread::current().id() })
        .unwrap();
    let second = other
        .run_blocking(async { std::thread::current().id() })
        .unwrap();

    assert_eq!(first, second);
}

#[test]
fn LoopHost___schedule___after_cancel_resolves_cancelled() {
    let host = test_host();

    let call = host
        .schedule(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        })
        .unwrap();
    call.cancel();

    assert!(matches!(call.result(), Err(BridgeError::Cancelled)));
}
