//! Per-invocation wait configuration
//!
//! A [`WaitSpec`] is built for a single wait and dropped once the wait
//! returns. Construction goes through [`WaitSpecBuilder::build`], which
//! rejects specs the polling loop cannot honor, so the loop itself never has
//! to re-check them.

use crate::StateLabel;
use crate::defaults::{
    DEFAULT_CONTINUOUS_TARGET_OCCURRENCE, DEFAULT_GROWTH_FACTOR, DEFAULT_JITTER,
    DEFAULT_MAX_POLL_INTERVAL, DEFAULT_MIN_POLL_INTERVAL, DEFAULT_NOT_FOUND_CHECKS,
    DEFAULT_REFRESH_GRACE, DEFAULT_TIMEOUT,
};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

/// Reasons a [`WaitSpec`] is rejected
#[derive(Debug, Error, PartialEq)]
pub enum SpecError {
    /// No target states declared
    #[error("target states cannot be empty")]
    EmptyTarget,

    /// A label appears in two of the pending/target/ignored sets
    #[error("state {state} is listed as both {first} and {second}")]
    OverlappingStates {
        state: String,
        first: &'static str,
        second: &'static str,
    },

    /// Minimum poll interval above the maximum
    #[error("min poll interval {min:?} exceeds max poll interval {max:?}")]
    InvalidIntervals { min: Duration, max: Duration },

    /// A zero poll interval would spin
    #[error("min poll interval must be greater than 0")]
    ZeroPollInterval,

    /// Growth factor below 1.0 or not finite
    #[error("growth factor must be a finite value >= 1.0, got {0}")]
    InvalidGrowthFactor(f64),

    /// Jitter outside 0.0 - 1.0
    #[error("jitter must be between 0.0 and 1.0, got {0}")]
    InvalidJitter(f64),
}

/// What to wait for and how long to keep polling.
#[derive(Debug, Clone)]
pub struct WaitSpec<S> {
    pending: HashSet<S>,
    target: HashSet<S>,
    ignored: HashSet<S>,
    timeout: Duration,
    delay: Duration,
    min_poll_interval: Duration,
    max_poll_interval: Duration,
    growth_factor: f64,
    jitter: f64,
    not_found_checks: u32,
    continuous_target_occurrence: u32,
    refresh_grace: Duration,
}

impl<S: StateLabel> WaitSpec<S> {
    /// Start building a spec seeded with the crate defaults.
    pub fn builder() -> WaitSpecBuilder<S> {
        WaitSpecBuilder::default()
    }

    /// Shortcut for the common case: pending and target sets plus a timeout.
    pub fn new<P, T>(pending: P, target: T, timeout: Duration) -> Result<Self, SpecError>
    where
        P: IntoIterator,
        P::Item: Into<S>,
        T: IntoIterator,
        T::Item: Into<S>,
    {
        Self::builder()
            .pending(pending)
            .target(target)
            .timeout(timeout)
            .build()
    }

    /// States that mean "not there yet, keep polling"
    pub fn pending(&self) -> &HashSet<S> {
        &self.pending
    }

    /// States that end the wait successfully
    pub fn target(&self) -> &HashSet<S> {
        &self.target
    }

    /// States that are tolerated without counting toward success
    pub fn ignored(&self) -> &HashSet<S> {
        &self.ignored
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait before the first refresh
    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn min_poll_interval(&self) -> Duration {
        self.min_poll_interval
    }

    pub fn max_poll_interval(&self) -> Duration {
        self.max_poll_interval
    }

    pub fn growth_factor(&self) -> f64 {
        self.growth_factor
    }

    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    pub fn not_found_checks(&self) -> u32 {
        self.not_found_checks
    }

    pub fn continuous_target_occurrence(&self) -> u32 {
        self.continuous_target_occurrence
    }

    pub fn refresh_grace(&self) -> Duration {
        self.refresh_grace
    }

    /// Check the invariants the polling loop relies on.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.target.is_empty() {
            return Err(SpecError::EmptyTarget);
        }

        let sets = [
            ("pending", &self.pending),
            ("target", &self.target),
            ("ignored", &self.ignored),
        ];
        for (i, (first, a)) in sets.iter().enumerate() {
            for (second, b) in &sets[i + 1..] {
                if let Some(state) = a.intersection(b).next() {
                    return Err(SpecError::OverlappingStates {
                        state: format!("{state:?}"),
                        first: *first,
                        second: *second,
                    });
                }
            }
        }

        if self.min_poll_interval.is_zero() {
            return Err(SpecError::ZeroPollInterval);
        }
        if self.min_poll_interval > self.max_poll_interval {
            return Err(SpecError::InvalidIntervals {
                min: self.min_poll_interval,
                max: self.max_poll_interval,
            });
        }
        if !self.growth_factor.is_finite() || self.growth_factor < 1.0 {
            return Err(SpecError::InvalidGrowthFactor(self.growth_factor));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(SpecError::InvalidJitter(self.jitter));
        }

        Ok(())
    }
}

/// Builder for [`WaitSpec`].
#[derive(Debug, Clone)]
pub struct WaitSpecBuilder<S> {
    spec: WaitSpec<S>,
}

impl<S> Default for WaitSpecBuilder<S> {
    fn default() -> Self {
        Self {
            spec: WaitSpec {
                pending: HashSet::new(),
                target: HashSet::new(),
                ignored: HashSet::new(),
                timeout: DEFAULT_TIMEOUT,
                delay: Duration::ZERO,
                min_poll_interval: DEFAULT_MIN_POLL_INTERVAL,
                max_poll_interval: DEFAULT_MAX_POLL_INTERVAL,
                growth_factor: DEFAULT_GROWTH_FACTOR,
                jitter: DEFAULT_JITTER,
                not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
                continuous_target_occurrence: DEFAULT_CONTINUOUS_TARGET_OCCURRENCE,
                refresh_grace: DEFAULT_REFRESH_GRACE,
            },
        }
    }
}

impl<S: StateLabel> WaitSpecBuilder<S> {
    /// Add pending states
    pub fn pending<I>(mut self, states: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<S>,
    {
        self.spec.pending.extend(states.into_iter().map(Into::into));
        self
    }

    /// Add target states
    pub fn target<I>(mut self, states: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<S>,
    {
        self.spec.target.extend(states.into_iter().map(Into::into));
        self
    }

    /// Add states to tolerate without failing
    pub fn ignored<I>(mut self, states: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<S>,
    {
        self.spec.ignored.extend(states.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.spec.timeout = timeout;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.spec.delay = delay;
        self
    }

    pub fn min_poll_interval(mut self, interval: Duration) -> Self {
        self.spec.min_poll_interval = interval;
        self
    }

    pub fn max_poll_interval(mut self, interval: Duration) -> Self {
        self.spec.max_poll_interval = interval;
        self
    }

    /// Fixed interval: min and max set to the same value, no growth.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.spec.min_poll_interval = interval;
        self.spec.max_poll_interval = interval;
        self.spec.growth_factor = 1.0;
        self
    }

    pub fn growth_factor(mut self, factor: f64) -> Self {
        self.spec.growth_factor = factor;
        self
    }

    pub fn jitter(mut self, jitter: f64) -> Self {
        self.spec.jitter = jitter;
        self
    }

    pub fn not_found_checks(mut self, checks: u32) -> Self {
        self.spec.not_found_checks = checks;
        self
    }

    /// Consecutive target observations required; 0 is treated as 1.
    pub fn continuous_target_occurrence(mut self, count: u32) -> Self {
        self.spec.continuous_target_occurrence = count.max(1);
        self
    }

    pub fn refresh_grace(mut self, grace: Duration) -> Self {
        self.spec.refresh_grace = grace;
        self
    }

    /// Validate and produce the spec.
    pub fn build(self) -> Result<WaitSpec<S>, SpecError> {
        self.spec.validate()?;
        Ok(self.spec)
    }
}
