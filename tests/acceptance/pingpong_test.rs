//! Ping-pong measurement acceptance tests.
//!
//! These tests run the full core-to-core measurement path: thread spawn,
//! optional pinning and elevation, the flag handshake, and report
//! assembly. Latency values are asserted for shape (finite, positive,
//! internally consistent), never for magnitude - that depends on the
//! host.
//!
//! # Requirements
//!
//! - At least two online CPU cores
//! - The ignored tests need RT privileges for full fidelity

use super::common::{is_root, num_cores, quick_config, quick_privileged_config};
use corelat_common::FidelityClass;
#[cfg(target_os = "linux")]
use corelat_common::MeasureConfig;
use corelat_harness::PairSampler;

/// End-to-end unprivileged run: every requested sample comes back with
/// consistent timing fields.
#[test]
fn test_pair_measurement_smoke() {
    if num_cores() < 2 {
        eprintln!("Skipping test: need at least 2 CPUs for a pair measurement");
        return;
    }

    let config = quick_config();
    let report = PairSampler::new(config.clone())
        .run()
        .expect("measurement run failed");

    assert_eq!(report.samples.len(), config.samples);
    assert_eq!(report.round_trips, config.round_trips);
    assert_ne!(report.core_a, report.core_b);

    for sample in &report.samples {
        assert!(sample.round_trip_ns.is_finite());
        assert!(sample.round_trip_ns >= 0.0);
        let expected = sample.one_way_ns * 2.0;
        assert!(
            (sample.round_trip_ns - expected).abs() < 1e-9,
            "one-way and round-trip disagree: {} vs {}",
            sample.one_way_ns,
            sample.round_trip_ns
        );
    }
}

/// Fidelity reporting is honest: a run that never asked for elevation or
/// pinning must not claim either, and can never grade as full.
#[test]
fn test_fidelity_reflects_unprivileged_run() {
    if num_cores() < 2 {
        eprintln!("Skipping test: need at least 2 CPUs for a pair measurement");
        return;
    }

    let report = PairSampler::new(quick_config())
        .run()
        .expect("measurement run failed");

    assert!(!report.fidelity.policy_elevated);
    assert!(!report.fidelity.pinned);
    assert_ne!(report.fidelity.class(), FidelityClass::Full);
}

/// The report serializes with every field a downstream consumer keys on.
#[test]
fn test_report_serializes_to_json() {
    if num_cores() < 2 {
        eprintln!("Skipping test: need at least 2 CPUs for a pair measurement");
        return;
    }

    let report = PairSampler::new(quick_config())
        .run()
        .expect("measurement run failed");
    let json = report.to_json().expect("report serialization failed");

    assert!(json.contains("\"core_a\""));
    assert!(json.contains("\"core_b\""));
    assert!(json.contains("\"timebase\""));
    assert!(json.contains("\"fidelity\""));
    assert!(json.contains("\"one_way_ns\""));
}

/// Full-fidelity run with pinning and elevation requested. The grade is
/// only asserted when the host actually granted everything; otherwise
/// the test reports what was granted and passes on the sample contract
/// alone.
#[test]
#[ignore = "Requires privileges for real-time scheduling and core pinning"]
fn test_full_fidelity_measurement() {
    if num_cores() < 2 {
        eprintln!("Skipping test: need at least 2 CPUs for a pair measurement");
        return;
    }

    let config = quick_privileged_config();
    let report = PairSampler::new(config.clone())
        .run()
        .expect("measurement run failed");

    println!("Full-fidelity run on cores {} -> {}:", report.core_a, report.core_b);
    println!("  samples:  {}", report.samples.len());
    println!("  timebase: hardware={}", report.fidelity.hardware_timebase);
    println!("  elevated: {}", report.fidelity.policy_elevated);
    println!("  pinned:   {}", report.fidelity.pinned);
    println!("  class:    {}", report.fidelity.class());

    assert_eq!(report.samples.len(), config.samples);

    if !report.fidelity.policy_elevated && is_root() {
        panic!("elevation not granted despite root privileges");
    }

    if report.fidelity.hardware_timebase
        && report.fidelity.policy_elevated
        && report.fidelity.pinned
    {
        assert_eq!(report.fidelity.class(), FidelityClass::Full);
    }
}

/// The real-time class is sticky on the calling thread and inherited by
/// the spawned echo thread, so a run after an elevated one must report
/// `policy_elevated` even with elevation switched off: the fidelity
/// record reflects what the scheduler says, not what was requested.
#[cfg(target_os = "linux")]
#[test]
#[ignore = "Requires privileges for real-time scheduling"]
fn test_fidelity_reports_retained_elevation() {
    if num_cores() < 2 {
        eprintln!("Skipping test: need at least 2 CPUs for a pair measurement");
        return;
    }

    let elevated_config = MeasureConfig {
        elevate: true,
        ..quick_config()
    };
    let first = PairSampler::new(elevated_config)
        .run()
        .expect("measurement run failed");
    if !first.fidelity.policy_elevated {
        if is_root() {
            panic!("elevation not granted despite root privileges");
        }
        eprintln!("Skipping test: real-time elevation not granted");
        return;
    }

    // Same calling thread, elevation now off.
    let second = PairSampler::new(quick_config())
        .run()
        .expect("measurement run failed");
    assert!(second.fidelity.policy_elevated);
}

/// Back-to-back runs keep producing complete reports; guards against
/// state leaking between measurement sessions (threads, flags, policy).
#[test]
#[ignore = "Long running"]
fn test_repeated_runs_stable() {
    if num_cores() < 2 {
        eprintln!("Skipping test: need at least 2 CPUs for a pair measurement");
        return;
    }

    let config = quick_config();
    let sampler = PairSampler::new(config.clone());

    for run in 0..5 {
        let report = sampler.run().expect("measurement run failed");
        assert_eq!(
            report.samples.len(),
            config.samples,
            "run {} returned a short report",
            run
        );
    }
}
