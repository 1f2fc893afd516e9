//! Thread policy acceptance tests.
//!
//! These tests verify elevation against a live kernel: the scheduling
//! state reported for ordinary threads, the error taxonomy seen by
//! unprivileged callers, and (when run with privileges) the observable
//! effect of a successful elevation.
//!
//! # Requirements
//!
//! - The ignored test needs root or CAP_SYS_NICE on Linux

#![allow(unused_imports)] // Per-platform tests pull different helpers

use super::common::is_root;
use corelat_probe::{get_thread_policy, max_importance, set_realtime_policy, PolicyError};
use std::sync::{Arc, Barrier};
use std::thread;

/// A freshly spawned thread starts in the timeshare class.
#[cfg(any(target_os = "linux", target_os = "macos"))]
#[test]
fn test_fresh_thread_reports_timeshared() {
    let state = thread::spawn(get_thread_policy)
        .join()
        .expect("observer thread panicked")
        .expect("policy query failed");

    assert!(!state.is_realtime);
}

/// Unprivileged elevation on Linux must surface EPERM through the
/// policy-stage error, not panic or silently succeed.
#[cfg(target_os = "linux")]
#[test]
fn test_unprivileged_elevation_error_taxonomy() {
    if is_root() {
        eprintln!("Skipping test: running as root, elevation would succeed");
        return;
    }

    let result = thread::spawn(set_realtime_policy)
        .join()
        .expect("worker thread panicked");

    match result {
        Err(PolicyError::PolicySetFailed { code }) => {
            assert_eq!(code, libc::EPERM, "unexpected errno");
        }
        // CAP_SYS_NICE or a nonzero RLIMIT_RTPRIO grants elevation
        // without root; nothing to assert about the failure path then.
        Ok(()) => {
            eprintln!("Skipping test: host grants RT scheduling to unprivileged callers");
        }
        other => panic!("expected PolicySetFailed without privileges, got {:?}", other),
    }
}

/// Platforms without scheduling control report the dedicated variant
/// from both operations.
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
#[test]
fn test_unsupported_platform_taxonomy() {
    assert_eq!(set_realtime_policy(), Err(PolicyError::Unsupported));
    assert_eq!(get_thread_policy(), Err(PolicyError::Unsupported));
    assert_eq!(max_importance(), 0);
}

/// Two threads elevating at the same time each observe only their own
/// request's outcome; nothing bleeds across.
#[cfg(any(target_os = "linux", target_os = "macos"))]
#[test]
fn test_concurrent_elevation_is_isolated() {
    let barrier = Arc::new(Barrier::new(2));

    let workers: Vec<_> = (0..2)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let set = set_realtime_policy();
                let state = get_thread_policy();
                (set, state)
            })
        })
        .collect();

    for worker in workers {
        let (set, state) = worker.join().expect("worker thread panicked");
        let state = state.expect("policy query failed");
        match set {
            // A successful or half-applied request leaves the thread
            // non-timeshared; a rejected one leaves it untouched.
            Ok(()) | Err(PolicyError::PrecedenceSetFailed { .. }) => {
                assert!(state.is_realtime);
            }
            Err(_) => assert!(!state.is_realtime),
        }
    }
}

/// Elevate a worker thread and read the state back through the query
/// path. Covers the full set-then-get round trip under privileges.
#[cfg(any(target_os = "linux", target_os = "macos"))]
#[test]
#[ignore = "Requires privileges for real-time scheduling"]
fn test_elevation_reflected_in_policy_state() {
    let outcome = thread::spawn(|| {
        let set = set_realtime_policy();
        let state = get_thread_policy();
        (set, state)
    })
    .join()
    .expect("worker thread panicked");

    if let Err(PolicyError::PolicySetFailed { code }) = outcome.0 {
        if !is_root() {
            eprintln!("Skipping test: elevation rejected (code {})", code);
            return;
        }
    }

    outcome.0.expect("elevation failed despite privileges");
    let state = outcome.1.expect("policy query failed");

    assert!(state.is_realtime, "elevated thread still timeshared");
    assert_eq!(state.importance, max_importance());
}

/// Elevation state is per-thread: an elevated worker must not leak its
/// scheduling class into threads spawned afterwards.
#[cfg(any(target_os = "linux", target_os = "macos"))]
#[test]
#[ignore = "Requires privileges for real-time scheduling"]
fn test_elevation_does_not_leak_across_threads() {
    let elevated = thread::spawn(set_realtime_policy)
        .join()
        .expect("worker thread panicked");

    if elevated.is_err() {
        eprintln!("Skipping test: elevation rejected (no RT privileges)");
        return;
    }

    let state = thread::spawn(get_thread_policy)
        .join()
        .expect("observer thread panicked")
        .expect("policy query failed");

    assert!(!state.is_realtime, "fresh thread inherited real-time class");
}
