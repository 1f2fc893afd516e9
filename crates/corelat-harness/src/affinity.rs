//! CPU affinity for measurement threads.
//!
//! On Linux `sched_setaffinity` gives a hard binding. On macOS the only
//! user-space mechanism is the Mach affinity tag, a grouping hint the
//! scheduler is free to ignore - and Apple Silicon rejects it outright -
//! so macOS threads are reported as unpinned even when the tag call
//! succeeds. Pinning failures are soft: the measurement proceeds and the
//! report says what actually held.

use corelat_common::HarnessResult;
use tracing::warn;

/// Number of logical cores visible to this process.
pub fn core_count() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}

/// Pin the calling thread to a logical core.
///
/// Returns `Ok(true)` when the kernel confirmed a hard binding and
/// `Ok(false)` when the platform could only take the request as a hint
/// (or not at all).
///
/// # Errors
///
/// Returns [`corelat_common::HarnessError::Affinity`] when the request
/// fails for a reason other than missing platform support, such as a core
/// index the kernel cannot represent.
#[cfg(target_os = "linux")]
pub fn pin_to_core(core: usize) -> HarnessResult<bool> {
    use corelat_common::HarnessError;
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::unistd::Pid;
    use tracing::debug;

    let mut cpu_set = CpuSet::new();
    cpu_set
        .set(core)
        .map_err(|e| HarnessError::Affinity(format!("invalid core index {core}: {e}")))?;

    match sched_setaffinity(Pid::from_raw(0), &cpu_set) {
        Ok(()) => {
            debug!(core, "thread pinned");
            Ok(true)
        }
        Err(e) => {
            if e == nix::errno::Errno::EINVAL {
                warn!(core, "core not in this process's cpu set, continuing unpinned");
                Ok(false)
            } else {
                Err(HarnessError::Affinity(format!(
                    "sched_setaffinity failed: {e}"
                )))
            }
        }
    }
}

/// Pin the calling thread to a logical core.
///
/// macOS affinity tags only group threads; they are applied when accepted
/// but always reported as `Ok(false)` because the thread is not bound.
#[cfg(target_os = "macos")]
pub fn pin_to_core(core: usize) -> HarnessResult<bool> {
    use tracing::debug;

    let mut policy = ffi::thread_affinity_policy {
        // Tag 0 is THREAD_AFFINITY_TAG_NULL, so tags start at core + 1.
        affinity_tag: core as ffi::integer_t + 1,
    };

    // SAFETY: pthread_mach_thread_np returns the kernel port for the given
    // pthread without transferring a send right; the policy struct lives
    // for the duration of the call.
    let kr = unsafe {
        let port = libc::pthread_mach_thread_np(libc::pthread_self());
        ffi::thread_policy_set(
            port,
            ffi::THREAD_AFFINITY_POLICY,
            std::ptr::addr_of_mut!(policy).cast(),
            ffi::THREAD_AFFINITY_POLICY_COUNT,
        )
    };

    if kr == ffi::KERN_SUCCESS {
        debug!(core, tag = core + 1, "affinity tag applied (hint only)");
    } else {
        // KERN_NOT_SUPPORTED on Apple Silicon.
        warn!(core, code = kr, "affinity tag rejected, continuing unpinned");
    }
    Ok(false)
}

/// Pin the calling thread to a logical core.
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub fn pin_to_core(core: usize) -> HarnessResult<bool> {
    warn!(core, "cpu affinity not available on this platform");
    Ok(false)
}

#[cfg(target_os = "macos")]
#[allow(non_camel_case_types)]
mod ffi {
    //! Minimal hand-declared Mach affinity bindings.

    pub type kern_return_t = libc::c_int;
    pub type integer_t = libc::c_int;
    pub type mach_msg_type_number_t = libc::c_uint;
    pub type thread_policy_flavor_t = libc::c_uint;

    pub const KERN_SUCCESS: kern_return_t = 0;
    pub const THREAD_AFFINITY_POLICY: thread_policy_flavor_t = 4;
    pub const THREAD_AFFINITY_POLICY_COUNT: mach_msg_type_number_t = 1;

    #[repr(C)]
    pub struct thread_affinity_policy {
        pub affinity_tag: integer_t,
    }

    extern "C" {
        pub fn thread_policy_set(
            thread: libc::mach_port_t,
            flavor: thread_policy_flavor_t,
            policy_info: *mut integer_t,
            count: mach_msg_type_number_t,
        ) -> kern_return_t;
    }
}
