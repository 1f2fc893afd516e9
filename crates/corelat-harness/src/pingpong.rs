//! Core-to-core latency sampling.
//!
//! Two threads hand a token back and forth through a pair of flags, each
//! flag alone on its own cache line. The sampling (ping) side runs on the
//! calling thread; the echo (pong) side is spawned. Both sides pin,
//! elevate, and meet at a barrier before the first handshake.
//!
//! One round trip is: ping publishes its flag, pong observes it and
//! publishes its own, ping observes that. A sample times `round_trips`
//! of these back to back and divides out, so per-read overhead of the
//! timebase never lands inside the measured path.

use corelat_common::{
    HarnessError, HarnessResult, LatencySample, MeasureConfig, MeasurementFidelity, PairReport,
};
use corelat_probe::{get_thread_policy, read_thread_local_id, set_realtime_policy};
use crossbeam_utils::CachePadded;
use static_assertions::const_assert;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use crate::affinity::{core_count, pin_to_core};
use crate::timebase::Timebase;

// Each flag must own a full cache line or the handshake measures false
// sharing instead of the interconnect.
const_assert!(std::mem::align_of::<CachePadded<AtomicBool>>() >= 64);

/// Flag pair shared by the two measurement threads.
struct SharedFlags {
    owned_by_ping: CachePadded<AtomicBool>,
    owned_by_pong: CachePadded<AtomicBool>,
}

impl SharedFlags {
    fn new() -> Self {
        Self {
            owned_by_ping: CachePadded::new(AtomicBool::new(false)),
            owned_by_pong: CachePadded::new(AtomicBool::new(false)),
        }
    }
}

/// What the echo thread managed to set up before measuring.
struct PongOutcome {
    pinned: bool,
    elevated: bool,
}

/// Samples one core pair with the flag handshake protocol.
pub struct PairSampler {
    config: MeasureConfig,
    timebase: Timebase,
}

impl PairSampler {
    /// Create a sampler with an auto-detected timebase.
    pub fn new(config: MeasureConfig) -> Self {
        Self {
            config,
            timebase: Timebase::detect(),
        }
    }

    /// Create a sampler against an explicit timebase.
    pub fn with_timebase(config: MeasureConfig, timebase: Timebase) -> Self {
        Self { config, timebase }
    }

    /// The timebase samples will be timed with.
    pub fn timebase(&self) -> Timebase {
        self.timebase
    }

    /// Run the measurement and collect the per-sample report.
    ///
    /// The sampling side runs on the calling thread. When pinning or
    /// elevation are enabled the calling thread keeps that affinity and
    /// scheduling class after this returns; like the policy module, the
    /// harness reports state changes rather than unwinding them. The
    /// fidelity record comes from a scheduler readback on both threads,
    /// so a class retained from an earlier run shows up even when
    /// `elevate` is off for this one.
    ///
    /// # Errors
    ///
    /// Fails on a zero sample or trip count, on an invalid core pair, on
    /// thread spawn failure, or when the echo thread panics. Pinning and
    /// elevation failures are soft; they only show up in the report's
    /// fidelity record.
    pub fn run(&self) -> HarnessResult<PairReport> {
        self.config.validate()?;

        let available = core_count();
        let (core_a, core_b) = self
            .config
            .pair
            .resolve(available)
            .ok_or(HarnessError::MatrixRequested)?;
        validate_pair(core_a, core_b, available)?;

        info!(
            core_a,
            core_b,
            samples = self.config.samples,
            round_trips = self.config.round_trips,
            "starting pair measurement"
        );

        let flags = Arc::new(SharedFlags::new());
        let barrier = Arc::new(Barrier::new(2));

        let samples = self.config.samples;
        let round_trips = self.config.round_trips;
        let warmup_trips = self.config.warmup_trips;
        let settle = self.config.settle;
        let elevate = self.config.elevate;
        let pin = self.config.pin;

        let pong = {
            let flags = Arc::clone(&flags);
            let barrier = Arc::clone(&barrier);
            thread::Builder::new()
                .name("corelat-pong".into())
                .spawn(move || {
                    let (pinned, elevated) = prepare_thread(core_b, pin, elevate, settle);
                    barrier.wait();
                    pong_loop(&flags, warmup_trips + samples * round_trips);
                    PongOutcome { pinned, elevated }
                })?
        };

        let (ping_pinned, ping_elevated) = prepare_thread(core_a, pin, elevate, settle);
        barrier.wait();

        let mut value = true;

        // Untimed handshakes to settle line ownership and branch
        // prediction before sampling starts.
        for _ in 0..warmup_trips {
            while flags.owned_by_pong.load(Ordering::Acquire) != value {}
            flags.owned_by_ping.store(value, Ordering::Release);
            value = !value;
        }

        let mut collected = Vec::with_capacity(samples);
        for _ in 0..samples {
            let id_before = read_thread_local_id();
            let start = self.timebase.now();

            for _ in 0..round_trips {
                // The bare spin is the measured path; a pause hint here
                // would show up in the numbers.
                while flags.owned_by_pong.load(Ordering::Acquire) != value {}
                flags.owned_by_ping.store(value, Ordering::Release);
                value = !value;
            }

            let end = self.timebase.now();
            let id_after = read_thread_local_id();

            let ticks = end.saturating_sub(start);
            let batch_ns = self.timebase.ticks_to_ns(ticks);
            let round_trip_ns = batch_ns / round_trips as f64;
            collected.push(LatencySample {
                ticks,
                round_trip_ns,
                one_way_ns: round_trip_ns / 2.0,
                migrated: id_before != id_after,
            });
        }

        // Loop counts are matched by construction, so the echo thread is
        // already done or about to be.
        let outcome = pong.join().map_err(|_| HarnessError::WorkerPanicked)?;

        let migrations = collected.iter().filter(|s| s.migrated).count();
        if migrations > 0 {
            warn!(
                migrations,
                "thread-local ID changed during some batches; those samples are marked"
            );
        }

        let fidelity = MeasurementFidelity {
            hardware_timebase: self.timebase.is_hardware(),
            policy_elevated: ping_elevated && outcome.elevated,
            pinned: ping_pinned && outcome.pinned,
        };
        info!(class = %fidelity.class(), "pair measurement complete");

        Ok(PairReport {
            core_a,
            core_b,
            round_trips,
            timebase: self.timebase.info(),
            fidelity,
            samples: collected,
        })
    }
}

/// Echo side: for every observed ping flip, flip back.
fn pong_loop(flags: &SharedFlags, handshakes: usize) {
    let mut value = false;
    for _ in 0..handshakes {
        while flags.owned_by_ping.load(Ordering::Acquire) != value {}
        flags.owned_by_pong.store(!value, Ordering::Release);
        value = !value;
    }
}

/// Pin and elevate the calling thread, then give the scheduler a moment
/// to act on it. Failures are logged and folded into the return flags.
fn prepare_thread(core: usize, pin: bool, elevate: bool, settle: Duration) -> (bool, bool) {
    let pinned = if pin {
        match pin_to_core(core) {
            Ok(bound) => bound,
            Err(e) => {
                warn!(core, error = %e, "pinning failed, continuing unpinned");
                false
            }
        }
    } else {
        false
    };

    if elevate {
        if let Err(e) = set_realtime_policy() {
            warn!(core, error = %e, "policy elevation failed, continuing timeshared");
        }
    }

    // The elevated flag is a readback, not the request outcome: the
    // real-time class is sticky across runs and inherited at spawn, so
    // a thread can hold it without asking here.
    let elevated = get_thread_policy()
        .map(|state| state.is_realtime)
        .unwrap_or(false);

    if !settle.is_zero() {
        thread::sleep(settle);
    }

    (pinned, elevated)
}

fn validate_pair(core_a: usize, core_b: usize, available: usize) -> HarnessResult<()> {
    if core_a == core_b {
        return Err(HarnessError::IdenticalCores(core_a));
    }
    for core in [core_a, core_b] {
        if core >= available {
            return Err(HarnessError::CoreOutOfRange { core, available });
        }
    }
    Ok(())
}
