//! High-resolution hardware timestamps.
//!
//! Exposes three aarch64 system registers:
//! - `TPIDR_EL0`: the thread-local ID word, used to detect thread migration
//! - `CNTVCT_EL0`: the virtual monotonic counter
//! - `CNTFRQ_EL0`: the counter frequency in Hz
//!
//! Every register read is bracketed by `isb` so out-of-order execution
//! cannot move measured work across the read, plus compiler fences so the
//! compiler cannot either. On any other architecture all three reads are
//! pinned to zero; callers are expected to treat a zero frequency as "no
//! hardware timestamps here" and fall back to a coarser clock.

/// A source of raw timestamp words.
///
/// Implementations must be monotonic for the counter read and constant for
/// the frequency read within a single boot. The thread-local ID is only
/// meaningful when compared against another read from the same thread.
pub trait CounterSource {
    /// Read the thread-local ID word for the calling thread.
    fn thread_local_id() -> u64;

    /// Read the monotonic counter.
    fn monotonic_counter() -> u64;

    /// Read the counter frequency in Hz.
    fn counter_frequency() -> u64;
}

/// Counter source backed by the real aarch64 registers.
#[cfg(target_arch = "aarch64")]
pub struct HardwareCounterSource;

#[cfg(target_arch = "aarch64")]
impl CounterSource for HardwareCounterSource {
    #[inline]
    fn thread_local_id() -> u64 {
        mrs::tpidr_el0()
    }

    #[inline]
    fn monotonic_counter() -> u64 {
        mrs::cntvct_el0()
    }

    #[inline]
    fn counter_frequency() -> u64 {
        mrs::cntfrq_el0()
    }
}

/// Counter source for builds without hardware support.
///
/// All reads return zero. In particular the zero frequency is the signal
/// that no hardware timestamps are available.
pub struct NullCounterSource;

impl CounterSource for NullCounterSource {
    #[inline]
    fn thread_local_id() -> u64 {
        0
    }

    #[inline]
    fn monotonic_counter() -> u64 {
        0
    }

    #[inline]
    fn counter_frequency() -> u64 {
        0
    }
}

/// The counter source selected for this build.
#[cfg(target_arch = "aarch64")]
pub type PlatformCounterSource = HardwareCounterSource;

/// The counter source selected for this build.
#[cfg(not(target_arch = "aarch64"))]
pub type PlatformCounterSource = NullCounterSource;

/// Read the calling thread's thread-local ID word.
///
/// Two reads from the same thread that differ indicate the thread was
/// moved between cores by the scheduler. Comparing IDs across threads
/// carries no meaning.
#[inline]
pub fn read_thread_local_id() -> u64 {
    PlatformCounterSource::thread_local_id()
}

/// Read the monotonic hardware counter.
///
/// Successive reads from the same thread never decrease. The read itself
/// is a handful of instructions and has no side effects.
#[inline]
pub fn read_monotonic_counter() -> u64 {
    PlatformCounterSource::monotonic_counter()
}

/// Read the hardware counter frequency in Hz.
///
/// The value is fixed for the lifetime of the boot, so callers may read
/// it once and cache it. Zero means this build has no hardware counter.
#[inline]
pub fn read_counter_frequency() -> u64 {
    PlatformCounterSource::counter_frequency()
}

/// Raw `mrs` reads, one function per register.
///
/// Each function does exactly one thing: fence, `isb`, `mrs`, `isb`,
/// fence. No other logic lives inside the unsafe boundary.
#[cfg(target_arch = "aarch64")]
mod mrs {
    use std::arch::asm;
    use std::sync::atomic::{compiler_fence, Ordering};

    /// Read `TPIDR_EL0`, the EL0 thread ID register.
    #[inline]
    pub fn tpidr_el0() -> u64 {
        compiler_fence(Ordering::SeqCst);
        let value: u64;
        // SAFETY: TPIDR_EL0 is readable from EL0; the read has no side
        // effects and touches no memory.
        unsafe {
            asm!(
                "isb",
                "mrs {}, tpidr_el0",
                "isb",
                out(reg) value,
                options(nostack, nomem),
            );
        }
        compiler_fence(Ordering::SeqCst);
        value
    }

    /// Read `CNTVCT_EL0`, the virtual counter register.
    #[inline]
    pub fn cntvct_el0() -> u64 {
        compiler_fence(Ordering::SeqCst);
        let value: u64;
        // SAFETY: CNTVCT_EL0 is readable from EL0; the leading isb keeps
        // earlier instructions from completing after the read, the
        // trailing isb keeps later ones from starting before it.
        unsafe {
            asm!(
                "isb",
                "mrs {}, cntvct_el0",
                "isb",
                out(reg) value,
                options(nostack, nomem),
            );
        }
        compiler_fence(Ordering::SeqCst);
        value
    }

    /// Read `CNTFRQ_EL0`, the counter frequency register.
    #[inline]
    pub fn cntfrq_el0() -> u64 {
        compiler_fence(Ordering::SeqCst);
        let value: u64;
        // SAFETY: CNTFRQ_EL0 is readable from EL0; the read has no side
        // effects and touches no memory.
        unsafe {
            asm!(
                "isb",
                "mrs {}, cntfrq_el0",
                "isb",
                out(reg) value,
                options(nostack, nomem),
            );
        }
        compiler_fence(Ordering::SeqCst);
        value
    }
}
