//! The polling loop
//!
//! Drives a refresh adapter until the observed state is classified as a
//! target (enough times in a row), something goes wrong, the time budget is
//! spent, or the caller cancels. Polls are strictly sequential: the next
//! refresh never starts before the previous one has been classified.

use crate::StateLabel;
use crate::backoff::PollSchedule;
use crate::classify::{TargetStreak, Verdict, classify};
use crate::outcome::{WaitError, WaiterOutcome, WaiterPhase};
use crate::refresh::{PollResult, RefreshResult};
use crate::spec::WaitSpec;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Wait for a resource to reach one of the target states in `spec`.
///
/// # Arguments
/// * `spec` - What to wait for and the timing policy
/// * `cancel` - Optional cancellation token; interrupts sleeps and in-flight refreshes
/// * `refresh` - Probe called once per poll, see [`crate::refresh`]
/// * `resource_name` - Name for logging
///
/// # Returns
/// Exactly one [`WaiterOutcome`]. A `Success` carries the payload of the
/// poll that confirmed the target state.
///
/// # Example
/// ```ignore
/// let spec = WaitSpec::new(["PENDING"], ["ENABLED"], Duration::from_secs(300))?;
/// let account = wait_for_state(
///     &spec,
///     Some(&cancel_token),
///     || async {
///         let account = describe_admin_account(&client, &id).await?;
///         Ok(account.map(|a| PollResult::new(a.status.clone(), a)))
///     },
///     "admin-account",
/// )
/// .await
/// .into_result()?;
/// ```
pub async fn wait_for_state<S, T, F, Fut>(
    spec: &WaitSpec<S>,
    cancel: Option<&CancellationToken>,
    mut refresh: F,
    resource_name: &str,
) -> WaiterOutcome<S, T>
where
    S: StateLabel,
    F: FnMut() -> Fut,
    Fut: Future<Output = RefreshResult<S, T>>,
{
    let mut run = WaitRun::new(spec, resource_name);
    let hard_stop = instant_after(run.deadline, spec.refresh_grace());
    let mut schedule = PollSchedule::new(spec);
    let mut streak = TargetStreak::new(spec.continuous_target_occurrence());
    let mut absent_streak = 0u32;
    // Set when the last sleep was cut short by the deadline: one more poll is owed
    let mut boundary_poll = false;

    if !spec.delay().is_zero() {
        let remaining = run.deadline.saturating_duration_since(Instant::now());
        let delay = spec.delay().min(remaining);
        debug!(
            resource = %resource_name,
            delay_ms = delay.as_millis(),
            "Delaying first refresh"
        );
        if !sleep_or_cancel(delay, cancel).await {
            return run.cancelled();
        }
        boundary_poll = spec.delay() >= remaining;
    }

    loop {
        if cancel.is_some_and(|token| token.is_cancelled()) {
            return run.cancelled();
        }
        if Instant::now() >= run.deadline && !boundary_poll {
            return run.timed_out();
        }
        boundary_poll = false;

        run.attempts += 1;
        run.phase = run.phase.advance(WaiterPhase::Polling);

        let polled = tokio::select! {
            biased;
            _ = wait_cancelled(cancel) => return run.cancelled(),
            result = refresh() => result,
            _ = tokio::time::sleep_until(hard_stop) => {
                warn!(
                    resource = %resource_name,
                    attempt = run.attempts,
                    "Refresh still running past the deadline, abandoning it"
                );
                return run.timed_out();
            }
        };

        match polled {
            Err(error) => {
                warn!(
                    resource = %resource_name,
                    attempt = run.attempts,
                    error = ?error,
                    "Refresh failed"
                );
                return run.finish(WaiterOutcome::RefreshError(error));
            }
            Ok(None) => {
                absent_streak += 1;
                streak.reset();
                run.last = None;
                if absent_streak > spec.not_found_checks() {
                    warn!(
                        resource = %resource_name,
                        checks = absent_streak,
                        "Resource not found"
                    );
                    return run.finish(WaiterOutcome::NotFound {
                        checks: absent_streak,
                    });
                }
                debug!(
                    resource = %resource_name,
                    attempt = run.attempts,
                    absent_streak,
                    "Resource not found yet"
                );
            }
            Ok(Some(result)) => {
                absent_streak = 0;
                let classification = classify(&result.state, spec);
                match streak.observe(classification) {
                    Verdict::Succeed => {
                        info!(
                            resource = %resource_name,
                            state = ?result.state,
                            attempts = run.attempts,
                            "Resource reached target state"
                        );
                        return run.finish(WaiterOutcome::Success(result.payload));
                    }
                    Verdict::Fail => {
                        warn!(
                            resource = %resource_name,
                            state = ?result.state,
                            attempts = run.attempts,
                            "Resource entered unexpected state"
                        );
                        return run.finish(WaiterOutcome::UnexpectedState(result));
                    }
                    Verdict::Continue => {
                        debug!(
                            resource = %resource_name,
                            attempt = run.attempts,
                            state = ?result.state,
                            classification = ?classification,
                            target_streak = streak.count(),
                            target_required = streak.required(),
                            "Resource not ready"
                        );
                        run.last = Some(result);
                    }
                }
            }
        }

        let now = Instant::now();
        if now >= run.deadline {
            return run.timed_out();
        }

        let next = schedule.next_delay(run.deadline - now);
        debug!(
            resource = %resource_name,
            delay_ms = next.delay.as_millis(),
            at_deadline = next.at_deadline,
            "Sleeping before next refresh"
        );
        if !sleep_or_cancel(next.delay, cancel).await {
            return run.cancelled();
        }
        boundary_poll = next.at_deadline;
    }
}

/// [`wait_for_state`] folded into a `Result`.
pub async fn wait_until_state<S, T, F, Fut>(
    spec: &WaitSpec<S>,
    cancel: Option<&CancellationToken>,
    refresh: F,
    resource_name: &str,
) -> Result<T, WaitError<S>>
where
    S: StateLabel,
    F: FnMut() -> Fut,
    Fut: Future<Output = RefreshResult<S, T>>,
{
    wait_for_state(spec, cancel, refresh, resource_name)
        .await
        .into_result()
}

/// Loop bookkeeping owned by a single invocation.
struct WaitRun<'a, S, T> {
    spec: &'a WaitSpec<S>,
    resource_name: &'a str,
    started: Instant,
    deadline: Instant,
    phase: WaiterPhase,
    attempts: u32,
    last: Option<PollResult<S, T>>,
}

impl<'a, S: StateLabel, T> WaitRun<'a, S, T> {
    fn new(spec: &'a WaitSpec<S>, resource_name: &'a str) -> Self {
        let started = Instant::now();
        Self {
            spec,
            resource_name,
            started,
            deadline: instant_after(started, spec.timeout()),
            phase: WaiterPhase::Initial,
            attempts: 0,
            last: None,
        }
    }

    fn finish(&mut self, outcome: WaiterOutcome<S, T>) -> WaiterOutcome<S, T> {
        self.phase = self.phase.advance(outcome.phase());
        debug!(
            resource = %self.resource_name,
            phase = ?self.phase,
            attempts = self.attempts,
            elapsed_ms = self.started.elapsed().as_millis(),
            "Wait finished"
        );
        outcome
    }

    fn timed_out(&mut self) -> WaiterOutcome<S, T> {
        let last = self.last.take();
        warn!(
            resource = %self.resource_name,
            timeout_secs = self.spec.timeout().as_secs_f64(),
            attempts = self.attempts,
            last_state = ?last.as_ref().map(|r| &r.state),
            "Timeout waiting for resource"
        );
        self.finish(WaiterOutcome::Timeout {
            last,
            timeout: self.spec.timeout(),
            attempts: self.attempts,
        })
    }

    fn cancelled(&mut self) -> WaiterOutcome<S, T> {
        info!(
            resource = %self.resource_name,
            attempts = self.attempts,
            "Wait cancelled"
        );
        let last = self.last.take();
        self.finish(WaiterOutcome::Cancelled {
            last,
            attempts: self.attempts,
        })
    }
}

/// Stand-in for instants past what the clock can represent (about 30 years out).
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `base + offset`, saturating to [`FAR_FUTURE`] instead of overflowing.
fn instant_after(base: Instant, offset: Duration) -> Instant {
    base.checked_add(offset).unwrap_or_else(|| base + FAR_FUTURE)
}

async fn wait_cancelled(cancel: Option<&CancellationToken>) {
    match cancel {
        Some(token) => token.cancelled().await,
        None => std::future::pending::<()>().await,
    }
}

/// Sleep for `delay`; returns false if cancelled first.
async fn sleep_or_cancel(delay: Duration, cancel: Option<&CancellationToken>) -> bool {
    tokio::select! {
        biased;
        _ = wait_cancelled(cancel) => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::FailureKind;
    use std::future::{Ready, ready};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    const INTERVAL: Duration = Duration::from_millis(100);

    fn spec(pending: &[&str], target: &[&str], timeout: Duration) -> WaitSpec<String> {
        WaitSpec::builder()
            .pending(pending.iter().map(|s| s.to_string()))
            .target(target.iter().map(|s| s.to_string()))
            .poll_interval(INTERVAL)
            .jitter(0.0)
            .timeout(timeout)
            .build()
            .unwrap()
    }

    /// Refresh that walks `states` and then repeats the last one; payload is the call index.
    fn scripted(
        states: &'static [&'static str],
    ) -> (
        Arc<AtomicU32>,
        impl FnMut() -> Ready<RefreshResult<String, u32>>,
    ) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let refresh = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let state = states[(n as usize).min(states.len() - 1)];
            ready(Ok(Some(PollResult::new(state.to_string(), n))))
        };
        (calls, refresh)
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_succeeds_immediately() {
        let (calls, refresh) = scripted(&["ENABLED"]);
        let outcome = wait_for_state(
            &spec(&["PENDING"], &["ENABLED"], INTERVAL * 5),
            None,
            refresh,
            "test-resource",
        )
        .await;

        assert_eq!(outcome.into_result().unwrap(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_retries_then_succeeds() {
        let (calls, refresh) = scripted(&["PENDING", "PENDING", "ENABLED"]);
        let started = Instant::now();
        let outcome = wait_for_state(
            &spec(&["PENDING"], &["ENABLED"], INTERVAL * 5),
            None,
            refresh,
            "test-resource",
        )
        .await;

        assert_eq!(outcome.into_result().unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= INTERVAL * 2 && started.elapsed() < INTERVAL * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_timeout_polls_at_deadline() {
        let (calls, refresh) = scripted(&["DELETING"]);
        let outcome = wait_for_state(
            &spec(&["DELETING"], &["NOT_FOUND"], INTERVAL * 3),
            None,
            refresh,
            "test-resource",
        )
        .await;

        assert_eq!(outcome.last_state().map(String::as_str), Some("DELETING"));
        match outcome {
            WaiterOutcome::Timeout { attempts, last, .. } => {
                // t=0, 100, 200 and the boundary poll at t=300
                assert_eq!(attempts, 4);
                assert_eq!(last.unwrap().payload, 3);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_never_polls() {
        let (calls, refresh) = scripted(&["ENABLED"]);
        let outcome = wait_for_state(
            &spec(&["PENDING"], &["ENABLED"], Duration::ZERO),
            None,
            refresh,
            "test-resource",
        )
        .await;

        assert_eq!(outcome.phase(), WaiterPhase::Failed(FailureKind::Timeout));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_cancellation() {
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            cancel_clone.cancel();
        });

        let (calls, refresh) = scripted(&["PENDING"]);
        let outcome = wait_for_state(
            &spec(&["PENDING"], &["ENABLED"], Duration::from_secs(10)),
            Some(&cancel),
            refresh,
            "test-resource",
        )
        .await;

        let err = outcome.into_result().unwrap_err();
        assert!(err.is_cancelled());
        assert!(err.to_string().contains("cancelled"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_refresh() {
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel_clone.cancel();
        });

        let outcome = wait_for_state(
            &spec(&["PENDING"], &["ENABLED"], Duration::from_secs(10)),
            Some(&cancel),
            || std::future::pending::<RefreshResult<String, ()>>(),
            "test-resource",
        )
        .await;

        assert_eq!(outcome.phase(), WaiterPhase::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_refresh_abandoned_after_grace() {
        let spec = WaitSpec::builder()
            .pending(["PENDING".to_string()])
            .target(["ENABLED".to_string()])
            .timeout(Duration::from_secs(1))
            .refresh_grace(Duration::from_secs(2))
            .build()
            .unwrap();
        let started = Instant::now();

        let outcome = wait_for_state(
            &spec,
            None,
            || std::future::pending::<RefreshResult<String, ()>>(),
            "test-resource",
        )
        .await;

        assert_eq!(outcome.phase(), WaiterPhase::Failed(FailureKind::Timeout));
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_check_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let outcome = wait_for_state(
            &spec(&["PENDING"], &["ENABLED"], INTERVAL * 5),
            None,
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Ok(Some(PollResult::new("PENDING".to_string(), ())))
                    } else {
                        anyhow::bail!("check failed")
                    }
                }
            },
            "test-resource",
        )
        .await;

        let err = outcome.into_result().unwrap_err();
        assert_eq!(err.kind(), WaiterPhase::Failed(FailureKind::RefreshError));
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("check failed"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_state_is_immediate() {
        let (calls, refresh) = scripted(&["PENDING", "DISABLED", "ENABLED"]);
        let started = Instant::now();
        let outcome = wait_for_state(
            &spec(&["PENDING"], &["ENABLED"], INTERVAL * 5),
            None,
            refresh,
            "test-resource",
        )
        .await;

        match outcome {
            WaiterOutcome::UnexpectedState(result) => assert_eq!(result.state, "DISABLED"),
            other => panic!("expected unexpected state, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= INTERVAL && started.elapsed() < INTERVAL * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ignored_state_keeps_polling() {
        let spec = WaitSpec::builder()
            .pending(["PENDING".to_string()])
            .target(["ENABLED".to_string()])
            .ignored(["UPDATING".to_string()])
            .poll_interval(INTERVAL)
            .jitter(0.0)
            .build()
            .unwrap();
        let (calls, refresh) = scripted(&["PENDING", "UPDATING", "ENABLED"]);

        let outcome = wait_for_state(&spec, None, refresh, "test-resource").await;

        assert!(outcome.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_continuous_target_occurrence() {
        let spec = WaitSpec::builder()
            .pending(["PENDING".to_string()])
            .target(["ENABLED".to_string()])
            .continuous_target_occurrence(2)
            .poll_interval(INTERVAL)
            .jitter(0.0)
            .build()
            .unwrap();
        let (calls, refresh) = scripted(&["ENABLED", "PENDING", "ENABLED", "ENABLED"]);

        let outcome = wait_for_state(&spec, None, refresh, "test-resource").await;

        assert_eq!(outcome.into_result().unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_checks_exhausted() {
        let spec = WaitSpec::builder()
            .pending(["PENDING".to_string()])
            .target(["ENABLED".to_string()])
            .not_found_checks(2)
            .poll_interval(INTERVAL)
            .jitter(0.0)
            .build()
            .unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let outcome = wait_for_state(
            &spec,
            None,
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                ready(Ok::<_, anyhow::Error>(None::<PollResult<String, ()>>))
            },
            "test-resource",
        )
        .await;

        assert!(matches!(outcome, WaiterOutcome::NotFound { checks: 3 }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_then_found() {
        let spec = WaitSpec::builder()
            .pending(["PENDING".to_string()])
            .target(["ENABLED".to_string()])
            .not_found_checks(2)
            .poll_interval(INTERVAL)
            .jitter(0.0)
            .build()
            .unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        // absent, absent, pending, absent, absent, enabled: the streak resets on sight
        let outcome = wait_for_state(
            &spec,
            None,
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let result = match n {
                    2 => Some(PollResult::new("PENDING".to_string(), n)),
                    5 => Some(PollResult::new("ENABLED".to_string(), n)),
                    _ => None,
                };
                ready(Ok::<_, anyhow::Error>(result))
            },
            "test-resource",
        )
        .await;

        assert_eq!(outcome.into_result().unwrap(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_delay() {
        let spec = WaitSpec::builder()
            .pending(["PENDING".to_string()])
            .target(["ENABLED".to_string()])
            .delay(Duration::from_secs(2))
            .build()
            .unwrap();
        let started = Instant::now();
        let first_poll = Arc::new(std::sync::Mutex::new(None));
        let first_poll_clone = first_poll.clone();

        let outcome = wait_for_state(
            &spec,
            None,
            move || {
                first_poll_clone
                    .lock()
                    .unwrap()
                    .get_or_insert(started.elapsed());
                ready(Ok::<_, anyhow::Error>(Some(PollResult::new(
                    "ENABLED".to_string(),
                    (),
                ))))
            },
            "test-resource",
        )
        .await;

        assert!(outcome.is_success());
        let first_poll = first_poll.lock().unwrap().expect("refresh was called");
        assert!(first_poll >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_past_deadline_still_polls_once() {
        let spec = WaitSpec::builder()
            .pending(["PENDING".to_string()])
            .target(["ENABLED".to_string()])
            .timeout(Duration::from_secs(1))
            .delay(Duration::from_secs(5))
            .build()
            .unwrap();
        let (calls, refresh) = scripted(&["ENABLED"]);
        let started = Instant::now();

        let outcome = wait_for_state(&spec, None, refresh, "test-resource").await;

        assert!(outcome.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_timeout_and_grace() {
        let spec = WaitSpec::builder()
            .pending(["PENDING".to_string()])
            .target(["ENABLED".to_string()])
            .timeout(Duration::MAX)
            .refresh_grace(Duration::MAX)
            .poll_interval(INTERVAL)
            .jitter(0.0)
            .build()
            .unwrap();
        let (calls, refresh) = scripted(&["PENDING", "ENABLED"]);

        let outcome = wait_for_state(&spec, None, refresh, "test-resource").await;

        assert_eq!(outcome.into_result().unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_instant_after_saturates() {
        let base = Instant::now();
        assert_eq!(
            instant_after(base, Duration::from_secs(1)),
            base + Duration::from_secs(1)
        );
        assert_eq!(instant_after(base, Duration::MAX), base + FAR_FUTURE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_absence_clears_last_state() {
        let spec = WaitSpec::builder()
            .pending(["PENDING".to_string()])
            .target(["ENABLED".to_string()])
            .timeout(INTERVAL * 3)
            .poll_interval(INTERVAL)
            .jitter(0.0)
            .build()
            .unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        // Seen pending once, then the resource disappears
        let outcome = wait_for_state(
            &spec,
            None,
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let result = (n == 0).then(|| PollResult::new("PENDING".to_string(), n));
                ready(Ok::<_, anyhow::Error>(result))
            },
            "test-resource",
        )
        .await;

        assert_eq!(outcome.phase(), WaiterPhase::Failed(FailureKind::Timeout));
        assert_eq!(outcome.last_state(), None);
        assert!(calls.load(Ordering::SeqCst) > 1);
    }
}
