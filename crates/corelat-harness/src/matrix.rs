//! All-pairs latency sweep.
//!
//! Runs the pair sampler once for every ordered pair of distinct logical
//! cores, row-major with the diagonal skipped, and collects the per-pair
//! reports into one matrix report. Direction matters: `(a, b)` and
//! `(b, a)` are separate measurements.
//!
//! A pair that fails to measure is logged and left out of the report, so
//! one unpinnable core does not abort a sweep that is otherwise hours of
//! accumulated samples.

use corelat_common::{CorePair, HarnessResult, MatrixReport, MeasureConfig};
use tracing::{info, warn};

use crate::affinity::core_count;
use crate::pingpong::PairSampler;
use crate::timebase::Timebase;

/// Sweeps every ordered core pair with the flag handshake protocol.
pub struct MatrixSampler {
    config: MeasureConfig,
    timebase: Timebase,
}

impl MatrixSampler {
    /// Create a sweep with an auto-detected timebase.
    pub fn new(config: MeasureConfig) -> Self {
        Self {
            config,
            timebase: Timebase::detect(),
        }
    }

    /// Create a sweep against an explicit timebase.
    pub fn with_timebase(config: MeasureConfig, timebase: Timebase) -> Self {
        Self { config, timebase }
    }

    /// The timebase every pair will be timed with.
    pub fn timebase(&self) -> Timebase {
        self.timebase
    }

    /// Run the full sweep and collect one report per measured pair.
    ///
    /// The configured `pair` field is ignored; the sweep visits every
    /// ordered pair itself. Each pair reuses the calling thread as its
    /// sampling side, so pinning re-binds that thread on every
    /// iteration and an elevated scheduling class carries across pairs.
    ///
    /// # Errors
    ///
    /// Fails on a zero sample or trip count. A failure on an individual
    /// pair does not abort the sweep; the pair is logged and omitted
    /// from the report.
    pub fn run(&self) -> HarnessResult<MatrixReport> {
        self.config.validate()?;

        let cores = core_count();
        let mut reports = Vec::with_capacity(cores.saturating_sub(1) * cores);

        info!(
            cores,
            pairs = cores * cores.saturating_sub(1),
            samples_per_pair = self.config.samples,
            "starting matrix sweep"
        );

        for core_a in 0..cores {
            for core_b in 0..cores {
                if core_a == core_b {
                    continue;
                }

                let mut pair_config = self.config.clone();
                pair_config.pair = CorePair::Pair(core_a, core_b);

                match PairSampler::with_timebase(pair_config, self.timebase).run() {
                    Ok(report) => reports.push(report),
                    Err(e) => {
                        warn!(core_a, core_b, error = %e, "pair failed, leaving it out of the matrix");
                    }
                }
            }
        }

        if reports.is_empty() {
            warn!(cores, "matrix sweep produced no measurable pairs");
        }
        info!(measured = reports.len(), "matrix sweep complete");

        Ok(MatrixReport { cores, reports })
    }
}
