#![allow(non_snake_case)]

use super::*;

#[test]
fn BridgeState___default___is_inert() {
    assert_eq!(BridgeState::default(), BridgeState::Inert);
}

#[test]
fn BridgeState___normal_lifecycle___transitions_are_allowed() {
    assert!(BridgeState::Inert.can_transition_to(BridgeState::Running));
    assert!(BridgeState::Running.can_transition_to(BridgeState::Stopping));
    assert!(BridgeState::Stopping.can_transition_to(BridgeState::Stopped));
}

#[test]
fn BridgeState___shutdown_before_first_use___goes_straight_to_stopped() {
    assert!(BridgeState::Inert.can_transition_to(BridgeState::Stopped));
}

#[test]
fn BridgeState___terminal_states___cannot_transition() {
    for target in [
        BridgeState::Inert,
        BridgeState::Running,
        BridgeState::Stopping,
        BridgeState::Stopped,
        BridgeState::Failed,
    ] {
        assert!(!BridgeState::Stopped.can_transition_to(target));
        assert!(!BridgeState::Failed.can_transition_to(target));
    }
}

#[test]
fn BridgeState___can_submit___only_before_shutdown() {
    assert!(BridgeState::Inert.can_submit());
    assert!(BridgeState::Running.can_submit());
    assert!(!BridgeState::Stopping.can_submit());
    assert!(!BridgeState::Stopped.can_submit());
    assert!(!BridgeState::Failed.can_submit());
}

#[test]
fn StateCell___new___starts_inert() {
    let cell = StateCell::new();

    assert_eq!(cell.get(), BridgeState::Inert);
}

#[test]
fn StateCell___transition_to___valid_target_updates_state() {
    let cell = StateCell::new();

    cell.transition_to(BridgeState::Running).unwrap();

    assert_eq!(cell.get(), BridgeState::Running);
}

#[test]
fn StateCell___transition_to___invalid_target_is_rejected() {
    let cell = StateCell::new();

    let result = cell.transition_to(BridgeState::Stopping);

    assert!(matches!(result, Err(BridgeError::InvalidState { .. })));
    assert_eq!(cell.get(), BridgeState::Inert);
}

#[test]
fn StateCell___set___bypasses_validation() {
    let cell = StateCell::new();

    cell.set(BridgeState::Failed);

    assert_eq!(cell.get(), BridgeState::Failed);
}

#[test]
fn StateCell___roundtrip___every_state_survives() {
    let cell = StateCell::new();
    for state in [
        BridgeState::Inert,
        BridgeState::Running,
        BridgeState::Stopping,
        BridgeState::Stopped,
        BridgeState::Failed,
    ] {
        cell.set(state);
        assert_eq!(cell.get(), state);
    }
}
