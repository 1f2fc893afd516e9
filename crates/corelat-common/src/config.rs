//! Configuration structures for latency measurement runs.
//!
//! Supports TOML deserialization with sensible defaults for
//! development and explicit values for controlled measurement.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level measurement configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasureConfig {
    /// Number of latency samples to collect per core pair.
    pub samples: usize,

    /// Flag handshakes folded into a single timed sample.
    pub round_trips: usize,

    /// Untimed handshakes before sampling starts.
    pub warmup_trips: usize,

    /// Pause after pinning and policy elevation so the scheduler can
    /// re-dispatch the threads onto their target cores.
    #[serde(with = "humantime_serde")]
    pub settle: Duration,

    /// Which cores to pair for the measurement.
    pub pair: CorePair,

    /// Request the real-time thread policy on both measurement threads.
    pub elevate: bool,

    /// Pin each measurement thread to its core.
    pub pin: bool,
}

impl Default for MeasureConfig {
    fn default() -> Self {
        Self {
            samples: 1000,
            round_trips: 1000,
            warmup_trips: 1000,
            settle: Duration::from_millis(1),
            pair: CorePair::Auto,
            elevate: true,
            pin: true,
        }
    }
}

/// Core pair specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorePair {
    /// Let the harness choose (first two logical cores).
    #[default]
    Auto,
    /// An explicit pair of logical core indices.
    Pair(usize, usize),
    /// Sweep every ordered pair of distinct cores.
    All,
}

impl CorePair {
    /// Resolve to concrete core indices given the number of logical cores.
    ///
    /// `Auto` picks cores 0 and 1; on a single-core machine both resolve to
    /// core 0 and the harness rejects the pair downstream. `All` names every
    /// pair at once and has no single resolution.
    pub fn resolve(self, available: usize) -> Option<(usize, usize)> {
        match self {
            CorePair::Auto => Some((0, if available > 1 { 1 } else { 0 })),
            CorePair::Pair(a, b) => Some((a, b)),
            CorePair::All => None,
        }
    }
}

impl fmt::Display for CorePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorePair::Auto => f.write_str("auto"),
            CorePair::Pair(a, b) => write!(f, "{a}-{b}"),
            CorePair::All => f.write_str("all"),
        }
    }
}

impl Serialize for CorePair {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            CorePair::Auto => serializer.serialize_str("auto"),
            CorePair::Pair(a, b) => [*a, *b].serialize(serializer),
            CorePair::All => serializer.serialize_str("all"),
        }
    }
}

impl<'de> Deserialize<'de> for CorePair {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct CorePairVisitor;

        impl<'de> Visitor<'de> for CorePairVisitor {
            type Value = CorePair;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("\"auto\", \"all\", or an array of two core indices")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                if value.eq_ignore_ascii_case("auto") {
                    Ok(CorePair::Auto)
                } else if value.eq_ignore_ascii_case("all") {
                    Ok(CorePair::All)
                } else {
                    Err(de::Error::custom(format!(
                        "unknown core pair keyword {value:?}, expected \"auto\" or \"all\""
                    )))
                }
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let a: usize = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let b: usize = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                if seq.next_element::<usize>()?.is_some() {
                    return Err(de::Error::custom("core pair takes exactly two indices"));
                }
                Ok(CorePair::Pair(a, b))
            }
        }

        deserializer.deserialize_any(CorePairVisitor)
    }
}

impl MeasureConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or a count field is zero.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the requested counts describe a measurable run.
    ///
    /// A timed batch divides elapsed time by `round_trips`, so zero trips
    /// would turn every sample into NaN or infinity; zero samples would
    /// produce an empty report. `warmup_trips` may legitimately be zero.
    ///
    /// # Errors
    ///
    /// Returns an error when `samples` or `round_trips` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.samples == 0 {
            return Err(ConfigError::Invalid("samples must be at least 1"));
        }
        if self.round_trips == 0 {
            return Err(ConfigError::Invalid("round_trips must be at least 1"));
        }
        Ok(())
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A parsed value fails range validation.
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
