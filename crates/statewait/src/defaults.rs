//! Default wait parameters
//!
//! These only seed [`WaitSpecBuilder`](crate::WaitSpecBuilder). Every wait
//! carries its own copy, so tests and callers can override any of them
//! without touching shared state.

use std::time::Duration;

/// Total time budget for a wait (5 minutes)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// First interval between polls
pub const DEFAULT_MIN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Cap for the growing poll interval
pub const DEFAULT_MAX_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Multiplier applied to the poll interval after every non-terminal poll
pub const DEFAULT_GROWTH_FACTOR: f64 = 2.0;

/// Jitter fraction (0.0 - 1.0) added on top of each interval
pub const DEFAULT_JITTER: f64 = 0.25;

/// Consecutive "absent" observations tolerated before giving up
pub const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

/// Consecutive target observations required for success
pub const DEFAULT_CONTINUOUS_TARGET_OCCURRENCE: u32 = 1;

/// How long an in-flight refresh may overrun the deadline before it is abandoned
pub const DEFAULT_REFRESH_GRACE: Duration = Duration::from_secs(5);
