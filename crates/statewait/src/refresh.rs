//! Refresh adapter contract
//!
//! The polling loop never talks to a remote API itself. Callers hand it a
//! zero-argument async closure that probes the resource once per call and
//! reports what it saw:
//!
//! - `Ok(Some(result))`: the resource exists and is in `result.state`
//! - `Ok(None)`: the resource is absent (tolerated for a bounded number of
//!   consecutive polls, see [`WaitSpec::not_found_checks`](crate::WaitSpec::not_found_checks))
//! - `Err(e)`: the probe itself failed; the wait stops immediately
//!
//! When absence is the *point* of the wait (deletion), map it to an explicit
//! label with [`PollResult::absent`] instead of returning `Ok(None)`.
//!
//! # Example
//! ```ignore
//! wait_for_state(&spec, Some(&cancel), || async {
//!     match client.describe(&id).await? {
//!         Some(account) => Ok(Some(PollResult::new(account.status.clone(), Some(account)))),
//!         None => Ok(Some(PollResult::absent(NOT_FOUND.to_string()))),
//!     }
//! }, "admin account").await
//! ```

/// One observation produced by a refresh call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollResult<S, T> {
    /// Observed state label
    pub state: S,
    /// Whatever the probe returned alongside the state
    pub payload: T,
}

/// What a refresh adapter returns for each poll.
pub type RefreshResult<S, T> = anyhow::Result<Option<PollResult<S, T>>>;

impl<S, T> PollResult<S, T> {
    pub fn new(state: S, payload: T) -> Self {
        Self { state, payload }
    }
}

impl<S, T> PollResult<S, Option<T>> {
    /// A sentinel observation for a resource that no longer exists.
    pub fn absent(state: S) -> Self {
        Self {
            state,
            payload: None,
        }
    }
}
