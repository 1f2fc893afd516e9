//! Common utilities for integration tests.
//!
//! Provides helpers for:
//! - Checking measurement prerequisites (privileges, core count)
//! - Building quick low-volume measurement configs

#![allow(dead_code)] // Not every helper is used on every platform

use corelat_common::{CorePair, MeasureConfig};
use std::time::Duration;

/// Check if running as root (required for Linux RT elevation).
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// Get the number of CPUs.
pub fn num_cores() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}

/// A measurement config small enough to finish in well under a second,
/// with no privileged operations requested.
pub fn quick_config() -> MeasureConfig {
    MeasureConfig {
        samples: 16,
        round_trips: 64,
        warmup_trips: 32,
        settle: Duration::ZERO,
        pair: CorePair::Auto,
        elevate: false,
        pin: false,
    }
}

/// Full-fidelity variant of [`quick_config`]: pinning and elevation
/// requested, still low-volume.
pub fn quick_privileged_config() -> MeasureConfig {
    MeasureConfig {
        elevate: true,
        pin: true,
        settle: Duration::from_millis(1),
        ..quick_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quick_config_is_unprivileged() {
        let config = quick_config();
        assert!(!config.elevate);
        assert!(!config.pin);
        assert!(config.samples <= 64);
    }

    #[test]
    fn test_privileged_config_requests_everything() {
        let config = quick_privileged_config();
        assert!(config.elevate);
        assert!(config.pin);
    }
}
