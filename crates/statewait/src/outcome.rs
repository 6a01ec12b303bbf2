//! Terminal outcomes of a wait
//!
//! Every wait ends in exactly one [`WaiterOutcome`]. Callers that just want
//! the payload or an error use [`WaiterOutcome::into_result`], which folds
//! the failure variants into [`WaitError`].

use crate::refresh::PollResult;
use std::time::Duration;
use thiserror::Error;

/// Which way a wait failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Observed a label outside pending/target/ignored
    UnexpectedState,
    /// Budget exhausted while still pending
    Timeout,
    /// The refresh adapter returned an error
    RefreshError,
    /// The resource stayed absent for too many consecutive polls
    NotFound,
}

/// Lifecycle of a single wait.
///
/// `Initial` moves to `Polling` on the first refresh; `Polling` loops on
/// itself while the resource is pending. Everything else is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WaiterPhase {
    #[default]
    Initial,
    Polling,
    Succeeded,
    Failed(FailureKind),
    Cancelled,
}

impl WaiterPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_) | Self::Cancelled)
    }

    /// Move to `next` unless already terminal.
    #[must_use]
    pub fn advance(self, next: WaiterPhase) -> WaiterPhase {
        if self.is_terminal() { self } else { next }
    }
}

/// How a wait ended.
#[derive(Debug)]
pub enum WaiterOutcome<S, T> {
    /// Target reached; carries the payload from the confirming poll
    Success(T),
    /// Ran out of time while the resource was still pending
    Timeout {
        last: Option<PollResult<S, T>>,
        timeout: Duration,
        attempts: u32,
    },
    /// The resource reported a state outside the declared vocabulary
    UnexpectedState(PollResult<S, T>),
    /// The refresh adapter failed
    RefreshError(anyhow::Error),
    /// The resource was absent for more than the allowed consecutive polls
    NotFound { checks: u32 },
    /// The caller cancelled the wait
    Cancelled {
        last: Option<PollResult<S, T>>,
        attempts: u32,
    },
}

impl<S, T> WaiterOutcome<S, T> {
    /// The terminal phase this outcome corresponds to.
    pub fn phase(&self) -> WaiterPhase {
        match self {
            Self::Success(_) => WaiterPhase::Succeeded,
            Self::Timeout { .. } => WaiterPhase::Failed(FailureKind::Timeout),
            Self::UnexpectedState(_) => WaiterPhase::Failed(FailureKind::UnexpectedState),
            Self::RefreshError(_) => WaiterPhase::Failed(FailureKind::RefreshError),
            Self::NotFound { .. } => WaiterPhase::Failed(FailureKind::NotFound),
            Self::Cancelled { .. } => WaiterPhase::Cancelled,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Last observed state label, when one is known.
    pub fn last_state(&self) -> Option<&S> {
        match self {
            Self::UnexpectedState(result) => Some(&result.state),
            Self::Timeout { last, .. } | Self::Cancelled { last, .. } => {
                last.as_ref().map(|r| &r.state)
            }
            Self::Success(_) | Self::RefreshError(_) | Self::NotFound { .. } => None,
        }
    }

    /// Keep the payload on success, convert everything else to a [`WaitError`].
    pub fn into_result(self) -> Result<T, WaitError<S>> {
        match self {
            Self::Success(payload) => Ok(payload),
            Self::Timeout {
                last,
                timeout,
                attempts,
            } => Err(WaitError::Timeout {
                timeout,
                attempts,
                last_state: last.map(|r| r.state),
            }),
            Self::UnexpectedState(result) => Err(WaitError::UnexpectedState {
                state: result.state,
            }),
            Self::RefreshError(source) => Err(WaitError::Refresh(source)),
            Self::NotFound { checks } => Err(WaitError::NotFound { checks }),
            Self::Cancelled { last, attempts } => Err(WaitError::Cancelled {
                attempts,
                last_state: last.map(|r| r.state),
            }),
        }
    }
}

/// Failure side of [`WaiterOutcome::into_result`].
#[derive(Debug, Error)]
pub enum WaitError<S> {
    #[error("timeout after {timeout:?} ({attempts} attempts, last state: {last_state:?})")]
    Timeout {
        timeout: Duration,
        attempts: u32,
        last_state: Option<S>,
    },

    #[error("unexpected state {state:?}")]
    UnexpectedState { state: S },

    #[error("refresh failed")]
    Refresh(#[source] anyhow::Error),

    #[error("resource not found after {checks} consecutive checks")]
    NotFound { checks: u32 },

    #[error("wait cancelled after {attempts} attempts (last state: {last_state:?})")]
    Cancelled {
        attempts: u32,
        last_state: Option<S>,
    },
}

impl<S> WaitError<S> {
    pub fn kind(&self) -> WaiterPhase {
        match self {
            Self::Timeout { .. } => WaiterPhase::Failed(FailureKind::Timeout),
            Self::UnexpectedState { .. } => WaiterPhase::Failed(FailureKind::UnexpectedState),
            Self::Refresh(_) => WaiterPhase::Failed(FailureKind::RefreshError),
            Self::NotFound { .. } => WaiterPhase::Failed(FailureKind::NotFound),
            Self::Cancelled { .. } => WaiterPhase::Cancelled,
        }
    }

    /// Only a timeout may succeed if retried unchanged (with a larger budget).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
