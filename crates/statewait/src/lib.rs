//! statewait - block until an eventually-consistent resource settles
//!
//! Cloud provisioning and deletion APIs are asynchronous: the call returns
//! long before the resource is usable (or gone). This crate polls a
//! caller-supplied refresh function until the observed state lands in a
//! target set, leaves the declared vocabulary, or the time budget runs out.
//!
//! ## Modules
//!
//! - [`backoff`]: poll interval schedule (exponential growth, jitter, deadline clamp)
//! - [`classify`]: pending/target/unexpected classification and the target streak
//! - [`defaults`]: default values used to seed [`WaitSpec`]
//! - [`outcome`]: terminal outcomes, phases and the typed error
//! - [`refresh`]: the refresh adapter contract
//! - [`spec`]: per-invocation wait configuration
//! - [`waiter`]: the polling loop

pub mod backoff;
pub mod classify;
pub mod defaults;
pub mod outcome;
pub mod refresh;
pub mod spec;
pub mod waiter;

use std::fmt::Debug;
use std::hash::Hash;

pub use classify::{Classification, TargetStreak, Verdict, classify};
pub use outcome::{FailureKind, WaitError, WaiterOutcome, WaiterPhase};
pub use refresh::{PollResult, RefreshResult};
pub use spec::{SpecError, WaitSpec, WaitSpecBuilder};
pub use waiter::{wait_for_state, wait_until_state};

/// A value identifying an observable resource state.
///
/// Labels are compared for equality only; no ordering is implied. Plain
/// `String`s and field-less enums both qualify.
pub trait StateLabel: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<T> StateLabel for T where T: Eq + Hash + Clone + Debug + Send + Sync + 'static {}
