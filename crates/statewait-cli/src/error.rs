//! Configuration errors
//!
//! Typed errors for loading and validating wait settings.

use statewait::SpecError;
use thiserror::Error;

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse JSON configuration
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Neither the command line nor the config file named a probe command
    #[error("no probe command given; pass it after `--` or set \"command\" in the config file")]
    MissingCommand,

    /// Field-level validation failed
    #[error("invalid configuration:\n{0}")]
    Invalid(garde::Report),

    /// The resulting wait spec was rejected
    #[error(transparent)]
    Spec(#[from] SpecError),
}

impl ConfigError {
    /// Create an IO error with path context
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
