//! Poll interval schedule
//!
//! Intervals grow multiplicatively from the configured minimum toward the maximum
//! (via `backon::ExponentialBuilder`), get a random jitter on top to keep
//! concurrent waiters from polling in lockstep, and are finally clamped to
//! whatever is left of the wait budget.

use crate::StateLabel;
use crate::spec::WaitSpec;
use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use rand::Rng;
use std::time::Duration;

/// The next sleep, clamped to the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledDelay {
    pub delay: Duration,
    /// The interval was cut short by the deadline; one more poll is due at the deadline itself
    pub at_deadline: bool,
}

/// Produces successive poll intervals for one wait.
pub struct PollSchedule {
    delays: ExponentialBackoff,
    max_delay: Duration,
    jitter: f64,
}

impl PollSchedule {
    pub fn new<S: StateLabel>(spec: &WaitSpec<S>) -> Self {
        let delays = ExponentialBuilder::default()
            .with_min_delay(spec.min_poll_interval())
            .with_max_delay(spec.max_poll_interval())
            .with_factor(spec.growth_factor() as f32)
            .without_max_times()
            .build();

        Self {
            delays,
            max_delay: spec.max_poll_interval(),
            jitter: spec.jitter(),
        }
    }

    /// Next interval with jitter applied, never above the configured max.
    pub fn next_interval(&mut self) -> Duration {
        let base = self.delays.next().unwrap_or(self.max_delay);
        jittered_delay(base, self.jitter).min(self.max_delay)
    }

    /// Next interval, clamped to `remaining`.
    pub fn next_delay(&mut self, remaining: Duration) -> ScheduledDelay {
        let interval = self.next_interval();
        if interval >= remaining {
            ScheduledDelay {
                delay: remaining,
                at_deadline: true,
            }
        } else {
            ScheduledDelay {
                delay: interval,
                at_deadline: false,
            }
        }
    }
}

/// Add jitter to a duration to prevent thundering herd.
fn jittered_delay(base: Duration, jitter_factor: f64) -> Duration {
    if jitter_factor <= 0.0 {
        return base;
    }
    let jitter = rand::thread_rng().gen_range(0.0..jitter_factor);
    Duration::try_from_secs_f64(base.as_secs_f64() * (1.0 + jitter)).unwrap_or(Duration::MAX)
}
