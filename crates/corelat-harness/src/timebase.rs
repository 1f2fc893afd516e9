//! Timebase selection and tick conversion.
//!
//! The hardware counter is used whenever the probe reports a non-zero
//! frequency; otherwise samples are timed in nanoseconds from a
//! process-local [`Instant`] origin. Either way, callers see opaque ticks
//! plus conversion helpers, so the sampler does not care which clock it
//! got.

use corelat_common::TimebaseInfo;
use corelat_probe::{read_counter_frequency, read_monotonic_counter};
use std::time::Instant;
use tracing::debug;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Clock used to timestamp samples.
#[derive(Debug, Clone, Copy)]
pub struct Timebase {
    kind: TimebaseKind,
}

#[derive(Debug, Clone, Copy)]
enum TimebaseKind {
    /// Hardware counter ticking at the architected frequency.
    Hardware {
        /// Counter frequency in Hz, cached once at detection.
        freq_hz: u64,
    },
    /// Nanoseconds elapsed since a process-local origin.
    Fallback { origin: Instant },
}

impl Timebase {
    /// Probe the hardware counter and pick the best available clock.
    pub fn detect() -> Self {
        Self::from_frequency(read_counter_frequency())
    }

    /// Build a timebase from an already-read counter frequency.
    ///
    /// A zero frequency selects the nanosecond fallback.
    pub fn from_frequency(freq_hz: u64) -> Self {
        if freq_hz > 0 {
            debug!(freq_hz, "using hardware counter timebase");
            Self {
                kind: TimebaseKind::Hardware { freq_hz },
            }
        } else {
            debug!("hardware counter unavailable, using nanosecond fallback");
            Self {
                kind: TimebaseKind::Fallback {
                    origin: Instant::now(),
                },
            }
        }
    }

    /// Current timestamp in ticks.
    #[inline]
    pub fn now(&self) -> u64 {
        match self.kind {
            TimebaseKind::Hardware { .. } => read_monotonic_counter(),
            TimebaseKind::Fallback { origin } => origin.elapsed().as_nanos() as u64,
        }
    }

    /// True when ticks come from the hardware counter.
    pub fn is_hardware(&self) -> bool {
        matches!(self.kind, TimebaseKind::Hardware { .. })
    }

    /// Tick frequency in Hz.
    pub fn frequency_hz(&self) -> u64 {
        match self.kind {
            TimebaseKind::Hardware { freq_hz } => freq_hz,
            TimebaseKind::Fallback { .. } => NANOS_PER_SEC,
        }
    }

    /// Duration of one tick in nanoseconds.
    pub fn tick_period_ns(&self) -> f64 {
        NANOS_PER_SEC as f64 / self.frequency_hz() as f64
    }

    /// Convert a tick count to nanoseconds.
    pub fn ticks_to_ns(&self, ticks: u64) -> f64 {
        ticks as f64 * self.tick_period_ns()
    }

    /// Smallest observable non-zero tick delta.
    ///
    /// Measured empirically from back-to-back reads; 1 when every pair of
    /// reads landed on the same tick.
    pub fn resolution_ticks(&self) -> u64 {
        let mut min_delta = u64::MAX;
        for _ in 0..1000 {
            let t1 = self.now();
            let t2 = self.now();
            let delta = t2.saturating_sub(t1);
            if delta > 0 && delta < min_delta {
                min_delta = delta;
            }
        }
        if min_delta == u64::MAX {
            1
        } else {
            min_delta
        }
    }

    /// Describe this timebase for reports.
    pub fn info(&self) -> TimebaseInfo {
        TimebaseInfo {
            hardware: self.is_hardware(),
            frequency_hz: self.frequency_hz(),
            tick_period_ns: self.tick_period_ns(),
        }
    }
}
