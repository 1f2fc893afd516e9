//! All-pairs matrix sweep acceptance tests.
//!
//! A sweep visits n*(n-1) ordered pairs, so the unignored test trims the
//! per-pair sample plan well below [`super::common::quick_config`] and
//! leaves the full-size sweep ignored.

use super::common::{num_cores, quick_config};
use corelat_common::{CorePair, MeasureConfig};
use corelat_harness::MatrixSampler;
use std::time::Duration;

fn sweep_config() -> MeasureConfig {
    MeasureConfig {
        samples: 2,
        round_trips: 16,
        warmup_trips: 8,
        settle: Duration::ZERO,
        pair: CorePair::All,
        elevate: false,
        pin: false,
    }
}

/// Every ordered pair of distinct cores gets a raw report, row-major
/// with the diagonal skipped, and the whole sweep serializes as one
/// JSON document.
#[test]
fn test_sweep_covers_every_ordered_pair() {
    if num_cores() < 2 {
        eprintln!("Skipping test: need at least 2 CPUs for a matrix sweep");
        return;
    }

    let config = sweep_config();
    let report = MatrixSampler::new(config.clone())
        .run()
        .expect("matrix sweep failed");

    let cores = report.cores;
    assert_eq!(cores, num_cores());
    assert_eq!(report.reports.len(), cores * (cores - 1));
    assert_eq!(report.reports[0].core_a, 0);
    assert_eq!(report.reports[0].core_b, 1);

    for pair in &report.reports {
        assert_ne!(pair.core_a, pair.core_b);
        assert!(pair.core_a < cores);
        assert!(pair.core_b < cores);
        assert_eq!(pair.samples.len(), config.samples);
        for sample in &pair.samples {
            assert!(sample.round_trip_ns.is_finite());
            assert!(sample.round_trip_ns >= 0.0);
        }
    }

    // Direction matters: (0, 1) and (1, 0) are separate measurements.
    assert!(report.pair(0, 1).is_some());
    assert!(report.pair(1, 0).is_some());

    let json = report.to_json().expect("sweep serialization failed");
    assert!(json.contains("\"cores\""));
    assert!(json.contains("\"reports\""));
    assert!(json.contains("\"one_way_ns\""));
}

/// Full-size sweep at the standard quick-config sample plan.
#[test]
#[ignore = "Long running"]
fn test_full_sweep_at_quick_volume() {
    if num_cores() < 2 {
        eprintln!("Skipping test: need at least 2 CPUs for a matrix sweep");
        return;
    }

    let config = MeasureConfig {
        pair: CorePair::All,
        ..quick_config()
    };
    let report = MatrixSampler::new(config.clone())
        .run()
        .expect("matrix sweep failed");

    assert_eq!(report.reports.len(), report.cores * (report.cores - 1));
    for pair in &report.reports {
        assert_eq!(pair.samples.len(), config.samples);
    }
}
