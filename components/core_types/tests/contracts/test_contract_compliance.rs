//! Contract tests for core_types
//!
//! These tests pin the names and defaults other components rely on.

use core_types::{RunMode, WorkerOptions, WorkerState};

#[test]
fn run_mode_names_are_stable() {
    assert_eq!(RunMode::Default.as_str(), "default");
    assert_eq!(RunMode::Once.as_str(), "once");
    assert_eq!(RunMode::NoWait.as_str(), "nowait");
}

#[test]
fn worker_options_default_to_shared_resources() {
    let options = WorkerOptions::default();
    assert!(!options.own_loop);
    assert!(!options.own_microtask_queue);
}

#[test]
fn worker_state_has_three_states() {
    let states = [
        WorkerState::Created,
        WorkerState::Running,
        WorkerState::Stopped,
    ];
    assert_eq!(states.len(), 3);
}
