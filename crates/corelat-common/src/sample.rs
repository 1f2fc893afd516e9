//! Sample records produced by a measurement run.
//!
//! These are raw per-sample observations. Aggregation and statistics are
//! deliberately left to downstream tooling; the types here only carry what
//! was measured and under what conditions.

use serde::Serialize;
use std::fmt;

/// One timed batch of flag handshakes between the paired cores.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LatencySample {
    /// Elapsed timebase ticks for the whole batch.
    pub ticks: u64,
    /// Nanoseconds for a single round trip.
    pub round_trip_ns: f64,
    /// Nanoseconds for a single one-way hop (half a round trip).
    pub one_way_ns: f64,
    /// The sampling thread's thread-local ID changed during the batch,
    /// so it may have migrated off its core.
    pub migrated: bool,
}

/// Description of the clock used to timestamp samples.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TimebaseInfo {
    /// True when samples came from the hardware counter register.
    pub hardware: bool,
    /// Counter frequency in Hz (10^9 for the nanosecond fallback).
    pub frequency_hz: u64,
    /// Duration of one tick in nanoseconds.
    pub tick_period_ns: f64,
}

impl fmt::Display for TimebaseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hardware {
            write!(
                f,
                "hardware counter, {} Hz ({:.2} ns/tick)",
                self.frequency_hz, self.tick_period_ns
            )
        } else {
            write!(f, "nanosecond fallback clock")
        }
    }
}

/// Conditions the samples were collected under.
///
/// Elevation and pinning are best-effort; when either fails the run still
/// proceeds and this record says what actually held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MeasurementFidelity {
    /// Timestamps came from the hardware counter rather than the fallback.
    pub hardware_timebase: bool,
    /// Both measurement threads held the real-time thread policy, per a
    /// scheduler readback after setup. A class retained from an earlier
    /// run or inherited at spawn counts.
    pub policy_elevated: bool,
    /// Both measurement threads are pinned to their cores.
    pub pinned: bool,
}

impl MeasurementFidelity {
    /// Collapse the individual conditions into a headline class.
    pub fn class(&self) -> FidelityClass {
        let scheduled = self.policy_elevated && self.pinned;
        match (self.hardware_timebase, scheduled) {
            (true, true) => FidelityClass::Full,
            (false, false) => FidelityClass::BestEffort,
            _ => FidelityClass::Reduced,
        }
    }
}

/// Headline trustworthiness of a measurement run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FidelityClass {
    /// Hardware timestamps, elevated and pinned threads.
    Full,
    /// Hardware timestamps or controlled scheduling, not both.
    Reduced,
    /// Fallback clock and uncontrolled scheduling.
    BestEffort,
}

impl fmt::Display for FidelityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FidelityClass::Full => f.write_str("full"),
            FidelityClass::Reduced => f.write_str("reduced"),
            FidelityClass::BestEffort => f.write_str("best-effort"),
        }
    }
}

/// Full report for one measured core pair.
#[derive(Debug, Clone, Serialize)]
pub struct PairReport {
    /// First core of the pair (the sampling thread).
    pub core_a: usize,
    /// Second core of the pair (the echo thread).
    pub core_b: usize,
    /// Handshakes per sample.
    pub round_trips: usize,
    /// Clock the samples were timed with.
    pub timebase: TimebaseInfo,
    /// Conditions that actually held during collection.
    pub fidelity: MeasurementFidelity,
    /// Raw samples in collection order.
    pub samples: Vec<LatencySample>,
}

impl PairReport {
    /// Serialize the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Report for an all-pairs sweep: one [`PairReport`] per measured
/// ordered pair, diagonal skipped.
#[derive(Debug, Clone, Serialize)]
pub struct MatrixReport {
    /// Number of logical cores the sweep iterated over.
    pub cores: usize,
    /// Per-pair reports in row-major order. A pair that failed to
    /// measure is absent rather than represented by a placeholder.
    pub reports: Vec<PairReport>,
}

impl MatrixReport {
    /// Look up the report for an ordered pair, if it was measured.
    pub fn pair(&self, core_a: usize, core_b: usize) -> Option<&PairReport> {
        self.reports
            .iter()
            .find(|r| r.core_a == core_a && r.core_b == core_b)
    }

    /// Serialize the sweep as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
