#![allow(non_snake_case)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::*;
use crate::handle::Wrappable;

struct Gate {
    entered: Arc<AtomicBool>,
    exits: Arc<AtomicU32>,
}

#[async_trait]
impl AsyncResource for Gate {
    type Item = u32;

    async fn enter(&self) -> u32 {
        self.entered.store(true, Ordering::SeqCst);
        7
    }

    async fn exit(&self, item: u32) {
        assert_eq!(item, 7);
        self.exits.fetch_add(1, Ordering::SeqCst);
    }
}

fn gate() -> (Gate, Arc<AtomicBool>, Arc<AtomicU32>) {
    let entered = Arc::new(AtomicBool::new(false));
    let exits = Arc::new(AtomicU32::new(0));
    (
        Gate {
            entered: entered.clone(),
            exits: exits.clone(),
        },
        entered,
        exits,
    )
}

fn test_sync() -> Synchronizer {
    Synchronizer::named("scope-tests")
}

#[test]
fn SyncScope___enter___acquires_and_exposes_the_value() {
    let sync = test_sync();
    let (gate, entered, _) = gate();
    let scope = sync.wrap_scope(gate);

    let guard = scope.enter().unwrap();

    assert!(entered.load(Ordering::SeqCst));
    assert_eq!(*guard.value(), 7);
}

#[test]
fn ScopeGuard___exit___releases_exactly_once() {
    let sync = test_sync();
    let (gate, _, exits) = gate();
    let scope = sync.wrap_scope(gate);

    let guard = scope.enter().unwrap();
    guard.exit().unwrap();

    assert_eq!(exits.load(Ordering::SeqCst), 1);
}

#[test]
fn ScopeGuard___drop___still_runs_exit() {
    let sync = test_sync();
    let (gate, _, exits) = gate();
    let scope = sync.wrap_scope(gate);

    {
        let _guard = scope.enter().unwrap();
        // body ends without an explicit exit
    }

    assert_eq!(exits.load(Ordering::SeqCst), 1);
}

#[test]
fn ScopeGuard___drop_during_panic___still_runs_exit() {
    let sync = test_sync();
    let (gate, _, exits) = gate();
    let scope = sync.wrap_scope(gate);

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _guard = scope.enter().unwrap();
        panic!("body failed");
    }));

    assert!(result.is_err());
    assert_eq!(exits.load(Ordering::SeqCst), 1);
}

#[test]
fn ScopeGuard___drop_after_shutdown___skips_exit() {
    let sync = Synchronizer::named("scope-shutdown");
    let (gate, _, exits) = gate();
    let scope = sync.wrap_scope(gate);
    let guard = scope.enter().unwrap();

    sync.shutdown().unwrap();
    drop(guard);

    assert_eq!(exits.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn AioScope___enter_and_exit___run_on_the_loop() {
    let sync = test_sync();
    let (gate, entered, exits) = gate();
    let scope = sync.wrap_scope(gate);

    let guard = scope.aio().enter().await.unwrap();
    assert!(entered.load(Ordering::SeqCst));
    assert_eq!(*guard.value(), 7);

    guard.exit().await.unwrap();
    assert_eq!(exits.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn AioGuard___drop___schedules_exit_detached() {
    let sync = test_sync();
    let (gate, _, exits) = gate();
    let scope = sync.wrap_scope(gate);

    let guard = scope.aio().enter().await.unwrap();
    drop(guard);

    let deadline = Instant::now() + Duration::from_secs(5);
    while exits.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(exits.load(Ordering::SeqCst), 1);
}

struct Conn {
    alive: bool,
}

impl Wrappable for Conn {}

struct Pool {
    conn: Arc<Conn>,
    returned_same: Arc<AtomicBool>,
}

#[async_trait]
impl AsyncResource for Pool {
    type Item = Arc<Conn>;

    async fn enter(&self) -> Arc<Conn> {
        self.conn.clone()
    }

    async fn exit(&self, item: Arc<Conn>) {
        self.returned_same
            .store(Arc::ptr_eq(&item, &self.conn), Ordering::SeqCst);
    }
}

#[test]
fn ScopeGuard___value___is_translated_out_and_back_for_exit() {
    let sync = test_sync();
    let conn = Arc::new(Conn { alive: true });
    let returned_same = Arc::new(AtomicBool::new(false));
    let scope = sync.wrap_scope(Pool {
        conn: conn.clone(),
        returned_same: returned_same.clone(),
    });

    let guard = scope.enter().unwrap();
    // the guard holds a wrapper for the pooled connection
    assert!(guard.value().get(|c| c.alive));
    assert!(Arc::ptr_eq(&guard.value().implementation(), &conn));

    guard.exit().unwrap();
    assert!(returned_same.load(Ordering::SeqCst));
}
