#![allow(non_snake_case)]

use super::*;

#[test]
fn BridgeError___closed___mentions_synchronizer_name() {
    let err = BridgeError::Closed {
        name: "default".to_string(),
    };

    assert_eq!(err.to_string(), "synchronizer `default` is closed");
}

#[test]
fn BridgeError___is_cancellation___covers_both_cancel_paths() {
    assert!(BridgeError::Cancelled.is_cancellation());
    assert!(BridgeError::Interrupted.is_cancellation());
    assert!(!BridgeError::WouldDeadlock.is_cancellation());
}

#[test]
fn BridgeError___is_shutdown___covers_closed_and_loop_failure() {
    let closed = BridgeError::Closed {
        name: "x".to_string(),
    };

    assert!(closed.is_shutdown());
    assert!(BridgeError::LoopFailed("thread died".to_string()).is_shutdown());
    assert!(!BridgeError::Cancelled.is_shutdown());
}

#[test]
fn BridgeError___is_misuse___covers_deadlock_and_future_refusal() {
    let refused = BridgeError::FuturesNotAllowed {
        name: "f".to_string(),
    };

    assert!(BridgeError::WouldDeadlock.is_misuse());
    assert!(refused.is_misuse());
    assert!(!BridgeError::Cancelled.is_misuse());
}

#[test]
fn BridgeError___kinds___are_disjoint() {
    let errors = [
        BridgeError::Cancelled,
        BridgeError::Closed {
            name: "x".to_string(),
        },
        BridgeError::WouldDeadlock,
    ];

    for err in &errors {
        let kinds = [err.is_cancellation(), err.is_shutdown(), err.is_misuse()];
        assert_eq!(kinds.iter().filter(|k| **k).count(), 1);
    }
}
