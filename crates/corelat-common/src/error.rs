use crate::config::ConfigError;
use thiserror::Error;

/// Harness error types covering configuration, pair validation, thread
/// lifecycle, and affinity failures.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The measurement configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A requested core index does not exist on this machine.
    #[error("core index {core} out of range ({available} logical cores detected)")]
    CoreOutOfRange {
        /// The offending core index.
        core: usize,
        /// Number of logical cores detected.
        available: usize,
    },

    /// Both halves of the pair name the same core.
    #[error("core pair must name two distinct cores (got {0} twice)")]
    IdenticalCores(usize),

    /// An all-pairs sweep was requested from the single-pair sampler.
    #[error("core pair \"all\" requires the matrix sampler")]
    MatrixRequested,

    /// A measurement thread could not be spawned.
    #[error("failed to spawn measurement thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// A measurement thread panicked before reporting back.
    #[error("measurement thread panicked")]
    WorkerPanicked,

    /// CPU affinity request failed for a reason other than lack of
    /// platform support.
    #[error("cpu affinity request failed: {0}")]
    Affinity(String),
}

/// Convenience type alias for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;
