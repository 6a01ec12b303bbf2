//! Wait configuration
//!
//! Settings come from an optional JSON file and are then overridden field by
//! field with command-line flags. The merged [`WaitConfig`] is validated with
//! `garde` before it is turned into a [`WaitSpec`].

use crate::error::ConfigError;
use garde::Validate;
use serde::{Deserialize, Serialize};
use statewait::WaitSpec;
use statewait::defaults::{
    DEFAULT_CONTINUOUS_TARGET_OCCURRENCE, DEFAULT_GROWTH_FACTOR, DEFAULT_JITTER,
    DEFAULT_MAX_POLL_INTERVAL, DEFAULT_MIN_POLL_INTERVAL, DEFAULT_NOT_FOUND_CHECKS,
    DEFAULT_TIMEOUT,
};
use std::path::Path;
use std::time::Duration;

fn default_name() -> String {
    "resource".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_min_interval_ms() -> u64 {
    DEFAULT_MIN_POLL_INTERVAL.as_millis() as u64
}

fn default_max_interval_ms() -> u64 {
    DEFAULT_MAX_POLL_INTERVAL.as_millis() as u64
}

fn default_growth_factor() -> f64 {
    DEFAULT_GROWTH_FACTOR
}

fn default_jitter() -> f64 {
    DEFAULT_JITTER
}

fn default_not_found_checks() -> u32 {
    DEFAULT_NOT_FOUND_CHECKS
}

fn default_consecutive() -> u32 {
    DEFAULT_CONTINUOUS_TARGET_OCCURRENCE
}

/// Default per-probe timeout (60 seconds)
fn default_command_timeout_secs() -> u64 {
    60
}

/// Settings for one `statewait` invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct WaitConfig {
    /// Resource name used in log lines
    #[serde(default = "default_name")]
    #[garde(length(min = 1))]
    pub name: String,

    /// Labels meaning "still working"
    #[serde(default)]
    #[garde(skip)]
    pub pending: Vec<String>,

    /// Labels meaning "done"
    #[serde(default)]
    #[garde(length(min = 1))]
    pub target: Vec<String>,

    /// Labels that are neither pending nor target but should not fail the wait
    #[serde(default)]
    #[garde(skip)]
    pub ignore: Vec<String>,

    /// Overall wait budget in seconds (default: 300)
    #[serde(default = "default_timeout_secs")]
    #[garde(skip)]
    pub timeout_secs: u64,

    /// Sleep before the first probe
    #[serde(default)]
    #[garde(skip)]
    pub delay_ms: u64,

    #[serde(default = "default_min_interval_ms")]
    #[garde(range(min = 1))]
    pub min_interval_ms: u64,

    #[serde(default = "default_max_interval_ms")]
    #[garde(range(min = 1))]
    pub max_interval_ms: u64,

    #[serde(default = "default_growth_factor")]
    #[garde(range(min = 1.0))]
    pub growth_factor: f64,

    /// Fraction of each interval added at random (0.0 - 1.0)
    #[serde(default = "default_jitter")]
    #[garde(range(min = 0.0, max = 1.0))]
    pub jitter: f64,

    /// Consecutive absent probes tolerated before giving up
    #[serde(default = "default_not_found_checks")]
    #[garde(skip)]
    pub not_found_checks: u32,

    /// Consecutive target observations required
    #[serde(default = "default_consecutive")]
    #[garde(range(min = 1))]
    pub consecutive: u32,

    /// Probe exit code that means "resource does not exist"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(skip)]
    pub absent_exit_code: Option<i32>,

    /// Label reported when the probe exits with `absent_exit_code`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[garde(length(min = 1))]
    pub absent_state: Option<String>,

    /// Probe command and its arguments
    #[serde(default)]
    #[garde(skip)]
    pub command: Vec<String>,

    /// Per-probe timeout in seconds (default: 60)
    #[serde(default = "default_command_timeout_secs")]
    #[garde(range(min = 1))]
    pub command_timeout_secs: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            pending: Vec::new(),
            target: Vec::new(),
            ignore: Vec::new(),
            timeout_secs: default_timeout_secs(),
            delay_ms: 0,
            min_interval_ms: default_min_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            growth_factor: default_growth_factor(),
            jitter: default_jitter(),
            not_found_checks: default_not_found_checks(),
            consecutive: default_consecutive(),
            absent_exit_code: None,
            absent_state: None,
            command: Vec::new(),
            command_timeout_secs: default_command_timeout_secs(),
        }
    }
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct WaitOverrides {
    pub name: Option<String>,
    pub pending: Option<Vec<String>>,
    pub target: Option<Vec<String>>,
    pub ignore: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
    pub delay_ms: Option<u64>,
    pub min_interval_ms: Option<u64>,
    pub max_interval_ms: Option<u64>,
    pub growth_factor: Option<f64>,
    pub jitter: Option<f64>,
    pub not_found_checks: Option<u32>,
    pub consecutive: Option<u32>,
    pub absent_exit_code: Option<i32>,
    pub absent_state: Option<String>,
    pub command: Vec<String>,
    pub command_timeout_secs: Option<u64>,
}

impl WaitConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::io(path.display().to_string(), e))?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Replace every field the overrides set.
    pub fn apply(&mut self, overrides: WaitOverrides) {
        let WaitOverrides {
            name,
            pending,
            target,
            ignore,
            timeout_secs,
            delay_ms,
            min_interval_ms,
            max_interval_ms,
            growth_factor,
            jitter,
            not_found_checks,
            consecutive,
            absent_exit_code,
            absent_state,
            command,
            command_timeout_secs,
        } = overrides;

        fn set<T>(field: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *field = value;
            }
        }

        set(&mut self.name, name);
        set(&mut self.pending, pending);
        set(&mut self.target, target);
        set(&mut self.ignore, ignore);
        set(&mut self.timeout_secs, timeout_secs);
        set(&mut self.delay_ms, delay_ms);
        set(&mut self.min_interval_ms, min_interval_ms);
        set(&mut self.max_interval_ms, max_interval_ms);
        set(&mut self.growth_factor, growth_factor);
        set(&mut self.jitter, jitter);
        set(&mut self.not_found_checks, not_found_checks);
        set(&mut self.consecutive, consecutive);
        if absent_exit_code.is_some() {
            self.absent_exit_code = absent_exit_code;
        }
        if absent_state.is_some() {
            self.absent_state = absent_state;
        }
        if !command.is_empty() {
            self.command = command;
        }
        set(&mut self.command_timeout_secs, command_timeout_secs);
    }

    /// Validate field ranges and build the wait spec.
    pub fn to_spec(&self) -> Result<WaitSpec<String>, ConfigError> {
        self.validate().map_err(ConfigError::Invalid)?;
        if self.command.is_empty() {
            return Err(ConfigError::MissingCommand);
        }

        let spec = WaitSpec::builder()
            .pending(self.pending.iter().cloned())
            .target(self.target.iter().cloned())
            .ignored(self.ignore.iter().cloned())
            .timeout(Duration::from_secs(self.timeout_secs))
            .delay(Duration::from_millis(self.delay_ms))
            .min_poll_interval(Duration::from_millis(self.min_interval_ms))
            .max_poll_interval(Duration::from_millis(self.max_interval_ms))
            .growth_factor(self.growth_factor)
            .jitter(self.jitter)
            .not_found_checks(self.not_found_checks)
            .continuous_target_occurrence(self.consecutive)
            .build()?;
        Ok(spec)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}
