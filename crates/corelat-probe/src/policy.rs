//! Real-time thread scheduling policy.
//!
//! Elevates the calling thread out of the kernel's fair-share scheduling so
//! a measurement loop is not preempted mid-sample. On macOS this is the
//! Mach extended policy (timeshare off) plus maximum precedence importance;
//! on Linux it is `SCHED_FIFO` at the maximum priority. Other platforms
//! report [`PolicyError::Unsupported`].
//!
//! Elevation is a two-step kernel conversation and the second step can fail
//! after the first has taken effect. That partial state is deliberately
//! left in place and reported as [`PolicyError::PrecedenceSetFailed`];
//! rolling back would just be a third call that can also fail.

use thiserror::Error;

/// Errors from thread policy manipulation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// The OS would not hand back a manipulable reference to the calling
    /// thread.
    #[error("could not obtain the calling thread's kernel handle")]
    HandleAcquisitionFailed,

    /// The scheduling policy request was rejected.
    #[error("scheduling policy request rejected by the kernel (code {code})")]
    PolicySetFailed {
        /// Raw kernel return or errno value.
        code: i32,
    },

    /// The importance request was rejected after the scheduling policy had
    /// already been applied. The thread is left non-timeshared at its
    /// previous importance.
    #[error("precedence request rejected after policy change (code {code})")]
    PrecedenceSetFailed {
        /// Raw kernel return or errno value.
        code: i32,
    },

    /// This build has no real-time scheduling support.
    #[error("real-time thread policy is not supported on this platform")]
    Unsupported,
}

/// Observed scheduling state of the calling thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThreadPolicyState {
    /// The thread runs outside the timeshare/fair-share class.
    pub is_realtime: bool,
    /// Current importance (macOS precedence) or priority (Linux).
    pub importance: i32,
}

/// Platform backend for thread policy manipulation.
///
/// Both operations act on the calling thread only; state observed by
/// [`ThreadPolicyProvider::get_thread_policy`] never reflects requests made
/// from other threads.
pub trait ThreadPolicyProvider {
    /// Move the calling thread into the real-time class at maximum
    /// importance.
    fn set_realtime_policy() -> Result<(), PolicyError>;

    /// Report the calling thread's current scheduling state.
    fn get_thread_policy() -> Result<ThreadPolicyState, PolicyError>;

    /// Largest importance value the platform will grant, 0 when unknown.
    fn max_importance() -> i32;
}

/// Provider for builds without any real-time scheduling control.
///
/// Both operations fail with [`PolicyError::Unsupported`] and leave the
/// thread untouched.
pub struct UnsupportedPolicyProvider;

impl ThreadPolicyProvider for UnsupportedPolicyProvider {
    fn set_realtime_policy() -> Result<(), PolicyError> {
        Err(PolicyError::Unsupported)
    }

    fn get_thread_policy() -> Result<ThreadPolicyState, PolicyError> {
        Err(PolicyError::Unsupported)
    }

    fn max_importance() -> i32 {
        0
    }
}

/// The policy provider selected for this build.
#[cfg(target_os = "macos")]
pub type PlatformPolicyProvider = mach::MachPolicyProvider;

/// The policy provider selected for this build.
#[cfg(target_os = "linux")]
pub type PlatformPolicyProvider = fifo::FifoPolicyProvider;

/// The policy provider selected for this build.
#[cfg(not(any(target_os = "macos", target_os = "linux")))]
pub type PlatformPolicyProvider = UnsupportedPolicyProvider;

#[cfg(target_os = "macos")]
pub use mach::MachPolicyProvider;

#[cfg(target_os = "linux")]
pub use fifo::FifoPolicyProvider;

/// Move the calling thread into the real-time class at maximum importance.
///
/// # Errors
///
/// See [`PolicyError`]. On [`PolicyError::PrecedenceSetFailed`] the thread
/// keeps the already-applied non-timeshared policy; the partial state is
/// reported, not unwound.
pub fn set_realtime_policy() -> Result<(), PolicyError> {
    PlatformPolicyProvider::set_realtime_policy()
}

/// Report the calling thread's current scheduling state.
///
/// # Errors
///
/// Returns [`PolicyError::Unsupported`] on builds without scheduling
/// control, or a query-stage error from the platform.
pub fn get_thread_policy() -> Result<ThreadPolicyState, PolicyError> {
    PlatformPolicyProvider::get_thread_policy()
}

/// Largest importance value the running platform will grant.
pub fn max_importance() -> i32 {
    PlatformPolicyProvider::max_importance()
}

#[cfg(target_os = "macos")]
mod mach {
    //! Mach thread policy backend.
    //!
    //! `thread_policy_set` with THREAD_EXTENDED_POLICY turns off timeshare
    //! scheduling, then THREAD_PRECEDENCE_POLICY raises importance to the
    //! maximum the kernel accepts (63).

    use super::{PolicyError, ThreadPolicyProvider, ThreadPolicyState};
    use tracing::warn;

    /// Highest precedence importance the kernel accepts for user threads.
    const MAX_IMPORTANCE: ffi::integer_t = 63;

    /// Thread policy provider backed by the Mach thread API.
    pub struct MachPolicyProvider;

    impl ThreadPolicyProvider for MachPolicyProvider {
        fn set_realtime_policy() -> Result<(), PolicyError> {
            let port = ThreadPort::acquire()?;

            let mut extended = ffi::thread_extended_policy { timeshare: 0 };
            // SAFETY: policy_info points at a thread_extended_policy that
            // lives for the duration of the call; the count matches.
            let kr = unsafe {
                ffi::thread_policy_set(
                    port.raw(),
                    ffi::THREAD_EXTENDED_POLICY,
                    std::ptr::addr_of_mut!(extended).cast(),
                    ffi::THREAD_EXTENDED_POLICY_COUNT,
                )
            };
            if kr != ffi::KERN_SUCCESS {
                warn!(code = kr, "extended policy request rejected");
                return Err(PolicyError::PolicySetFailed { code: kr });
            }

            let mut precedence = ffi::thread_precedence_policy {
                importance: MAX_IMPORTANCE,
            };
            // SAFETY: same contract as above for thread_precedence_policy.
            let kr = unsafe {
                ffi::thread_policy_set(
                    port.raw(),
                    ffi::THREAD_PRECEDENCE_POLICY,
                    std::ptr::addr_of_mut!(precedence).cast(),
                    ffi::THREAD_PRECEDENCE_POLICY_COUNT,
                )
            };
            if kr != ffi::KERN_SUCCESS {
                // Timeshare is already off at this point; the caller learns
                // about the half-applied state through the error variant.
                warn!(code = kr, "precedence request rejected after policy change");
                return Err(PolicyError::PrecedenceSetFailed { code: kr });
            }

            Ok(())
        }

        fn get_thread_policy() -> Result<ThreadPolicyState, PolicyError> {
            let port = ThreadPort::acquire()?;

            let mut extended = ffi::thread_extended_policy { timeshare: 1 };
            let mut count = ffi::THREAD_EXTENDED_POLICY_COUNT;
            let mut get_default: ffi::boolean_t = 0;
            // SAFETY: out-pointers reference locals that outlive the call.
            let kr = unsafe {
                ffi::thread_policy_get(
                    port.raw(),
                    ffi::THREAD_EXTENDED_POLICY,
                    std::ptr::addr_of_mut!(extended).cast(),
                    &mut count,
                    &mut get_default,
                )
            };
            if kr != ffi::KERN_SUCCESS {
                return Err(PolicyError::PolicySetFailed { code: kr });
            }

            let mut precedence = ffi::thread_precedence_policy { importance: 0 };
            let mut count = ffi::THREAD_PRECEDENCE_POLICY_COUNT;
            let mut get_default: ffi::boolean_t = 0;
            // SAFETY: out-pointers reference locals that outlive the call.
            let kr = unsafe {
                ffi::thread_policy_get(
                    port.raw(),
                    ffi::THREAD_PRECEDENCE_POLICY,
                    std::ptr::addr_of_mut!(precedence).cast(),
                    &mut count,
                    &mut get_default,
                )
            };
            if kr != ffi::KERN_SUCCESS {
                return Err(PolicyError::PrecedenceSetFailed { code: kr });
            }

            Ok(ThreadPolicyState {
                is_realtime: extended.timeshare == 0,
                importance: precedence.importance,
            })
        }

        fn max_importance() -> i32 {
            MAX_IMPORTANCE
        }
    }

    /// Send right from `mach_thread_self`; must be handed back to the task
    /// when done, so acquisition and release are paired through RAII.
    struct ThreadPort(ffi::thread_act_t);

    impl ThreadPort {
        fn acquire() -> Result<Self, PolicyError> {
            // SAFETY: mach_thread_self has no preconditions.
            let port = unsafe { ffi::mach_thread_self() };
            if port == ffi::MACH_PORT_NULL {
                return Err(PolicyError::HandleAcquisitionFailed);
            }
            Ok(Self(port))
        }

        fn raw(&self) -> ffi::thread_act_t {
            self.0
        }
    }

    impl Drop for ThreadPort {
        fn drop(&mut self) {
            // SAFETY: the port came from mach_thread_self and is released
            // exactly once.
            unsafe {
                ffi::mach_port_deallocate(ffi::mach_task_self_, self.0);
            }
        }
    }

    #[allow(non_camel_case_types)]
    mod ffi {
        //! Minimal hand-declared Mach thread policy bindings.

        use std::mem::size_of;

        pub type kern_return_t = libc::c_int;
        pub type mach_port_t = libc::c_uint;
        pub type thread_act_t = mach_port_t;
        pub type thread_policy_flavor_t = libc::c_uint;
        pub type mach_msg_type_number_t = libc::c_uint;
        pub type boolean_t = libc::c_uint;
        pub type integer_t = libc::c_int;

        pub const KERN_SUCCESS: kern_return_t = 0;
        pub const MACH_PORT_NULL: mach_port_t = 0;

        pub const THREAD_EXTENDED_POLICY: thread_policy_flavor_t = 1;
        pub const THREAD_PRECEDENCE_POLICY: thread_policy_flavor_t = 2;

        #[repr(C)]
        pub struct thread_extended_policy {
            pub timeshare: boolean_t,
        }

        #[repr(C)]
        pub struct thread_precedence_policy {
            pub importance: integer_t,
        }

        pub const THREAD_EXTENDED_POLICY_COUNT: mach_msg_type_number_t =
            (size_of::<thread_extended_policy>() / size_of::<integer_t>())
                as mach_msg_type_number_t;
        pub const THREAD_PRECEDENCE_POLICY_COUNT: mach_msg_type_number_t =
            (size_of::<thread_precedence_policy>() / size_of::<integer_t>())
                as mach_msg_type_number_t;

        extern "C" {
            pub static mach_task_self_: mach_port_t;

            pub fn mach_thread_self() -> thread_act_t;

            pub fn mach_port_deallocate(task: mach_port_t, name: mach_port_t) -> kern_return_t;

            pub fn thread_policy_set(
                thread: thread_act_t,
                flavor: thread_policy_flavor_t,
                policy_info: *mut integer_t,
                count: mach_msg_type_number_t,
            ) -> kern_return_t;

            pub fn thread_policy_get(
                thread: thread_act_t,
                flavor: thread_policy_flavor_t,
                policy_info: *mut integer_t,
                count: *mut mach_msg_type_number_t,
                get_default: *mut boolean_t,
            ) -> kern_return_t;
        }
    }
}

#[cfg(target_os = "linux")]
mod fifo {
    //! Linux `SCHED_FIFO` backend.
    //!
    //! `sched_setscheduler` with pid 0 scopes the change to the calling
    //! kernel task. Policy and priority change in one call here, so the
    //! half-applied precedence state cannot arise on this platform.

    use super::{PolicyError, ThreadPolicyProvider, ThreadPolicyState};
    use tracing::warn;

    /// Thread policy provider backed by POSIX real-time scheduling.
    pub struct FifoPolicyProvider;

    impl ThreadPolicyProvider for FifoPolicyProvider {
        fn set_realtime_policy() -> Result<(), PolicyError> {
            let max = Self::max_importance();
            if max <= 0 {
                return Err(PolicyError::PolicySetFailed { code: errno() });
            }

            let param = libc::sched_param {
                sched_priority: max,
            };
            // SAFETY: param outlives the call; pid 0 is the calling thread.
            if unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) } == -1 {
                let code = errno();
                if code == libc::EPERM {
                    warn!(
                        "sched_setscheduler rejected with EPERM - running without RT privileges. \
                         Consider running with CAP_SYS_NICE capability or as root."
                    );
                }
                return Err(PolicyError::PolicySetFailed { code });
            }

            Ok(())
        }

        fn get_thread_policy() -> Result<ThreadPolicyState, PolicyError> {
            // SAFETY: pid 0 queries the calling thread.
            let policy = unsafe { libc::sched_getscheduler(0) };
            if policy == -1 {
                return Err(PolicyError::PolicySetFailed { code: errno() });
            }

            let mut param = libc::sched_param { sched_priority: 0 };
            // SAFETY: param is valid for writes for the duration of the call.
            if unsafe { libc::sched_getparam(0, &mut param) } == -1 {
                return Err(PolicyError::PrecedenceSetFailed { code: errno() });
            }

            Ok(ThreadPolicyState {
                is_realtime: policy == libc::SCHED_FIFO || policy == libc::SCHED_RR,
                importance: param.sched_priority,
            })
        }

        fn max_importance() -> i32 {
            // SAFETY: querying a policy constant has no preconditions.
            let max = unsafe { libc::sched_get_priority_max(libc::SCHED_FIFO) };
            if max == -1 {
                0
            } else {
                max
            }
        }
    }

    fn errno() -> i32 {
        std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
    }
}
