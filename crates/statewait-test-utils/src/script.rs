//! Scripted refresh adapter
//!
//! A `ScriptedRefresh` replays a fixed list of [`Step`]s, one per refresh
//! call, and repeats the final step forever once the list is exhausted. It
//! counts calls so tests can assert exactly how many polls happened, and can
//! trigger a cancellation token at a chosen call to exercise cancellation
//! races deterministically.

use statewait::{PollResult, RefreshResult};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio_util::sync::CancellationToken;

/// One scripted refresh response
#[derive(Debug, Clone)]
pub enum Step<S, T> {
    /// Report `state` with `payload`
    Observe(S, T),
    /// Report the resource as absent
    Absent,
    /// Fail the refresh with this message
    Fail(String),
}

struct CancelAt {
    call: u32,
    token: CancellationToken,
}

/// Deterministic refresh adapter for tests.
pub struct ScriptedRefresh<S, T> {
    steps: Vec<Step<S, T>>,
    calls: AtomicU32,
    cancel_at: Mutex<Option<CancelAt>>,
}

impl<S: Clone, T: Clone> ScriptedRefresh<S, T> {
    /// Script from explicit steps.
    ///
    /// # Panics
    /// If `steps` is empty.
    pub fn new(steps: impl IntoIterator<Item = Step<S, T>>) -> Self {
        let steps: Vec<_> = steps.into_iter().collect();
        assert!(!steps.is_empty(), "script needs at least one step");
        Self {
            steps,
            calls: AtomicU32::new(0),
            cancel_at: Mutex::new(None),
        }
    }

    /// Cancel `token` while serving the `call`-th refresh (1-based).
    ///
    /// The refresh still returns its scripted step; the waiter sees the
    /// cancellation before it polls again.
    pub fn cancel_at(self, call: u32, token: CancellationToken) -> Self {
        *self.cancel_at.lock().unwrap() = Some(CancelAt { call, token });
        self
    }

    /// Number of refresh calls served so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Serve the next step.
    pub async fn refresh(&self) -> RefreshResult<S, T> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(cancel) = self.cancel_at.lock().unwrap().as_ref() {
            if cancel.call == call + 1 {
                cancel.token.cancel();
            }
        }

        let index = (call as usize).min(self.steps.len() - 1);
        match &self.steps[index] {
            Step::Observe(state, payload) => {
                Ok(Some(PollResult::new(state.clone(), payload.clone())))
            }
            Step::Absent => Ok(None),
            Step::Fail(message) => Err(anyhow::anyhow!("{message}")),
        }
    }
}

impl<S: Clone> ScriptedRefresh<S, u32> {
    /// Script observing `states` in order; each payload is the step index.
    pub fn states(states: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            states
                .into_iter()
                .enumerate()
                .map(|(i, state)| Step::Observe(state, i as u32)),
        )
    }
}
