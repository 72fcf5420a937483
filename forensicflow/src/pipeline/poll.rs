//! Bounded poll-and-retry executor for asynchronous stages.
//!
//! A [`PollPolicy`] describes how often a stage is re-invoked while it
//! reports `Pending` (or fails with a retryable error kind), how the delay
//! grows, and when to give up. Exhausting the budget converts the last
//! pending reason into [`CaptureError::RetryExhausted`].

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cancellation::CancellationToken;
use crate::core::{CaptureStage, StageResult};
use crate::errors::CaptureError;

/// Jitter strategy applied to each computed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    #[default]
    None,
    /// Random from 0 to delay
    Full,
    /// Half fixed, half random
    Equal,
}

/// Poll/retry policy for one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Delay after the first unsuccessful attempt, in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Multiplier applied to the delay after every further attempt.
    #[serde(default = "default_backoff_rate")]
    pub backoff_rate: f64,
    /// Maximum number of invocations, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Upper bound for a single delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Jitter strategy.
    #[serde(default)]
    pub jitter: JitterStrategy,
    /// Error kinds (see [`CaptureError::kind`]) that are retried instead of failing.
    #[serde(default = "default_retry_on")]
    pub retry_on: Vec<String>,
}

fn default_interval_ms() -> u64 {
    30_000
}

fn default_backoff_rate() -> f64 {
    1.5
}

// 30s, 45s, then 60s: about 13 minutes in total, inside the 20 minute incident timeout.
fn default_max_attempts() -> u32 {
    15
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_retry_on() -> Vec<String> {
    vec!["transient_error".to_string()]
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            backoff_rate: default_backoff_rate(),
            max_attempts: default_max_attempts(),
            max_delay_ms: default_max_delay_ms(),
            jitter: JitterStrategy::None,
            retry_on: default_retry_on(),
        }
    }
}

impl PollPolicy {
    /// Creates a policy with the default cadence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that invokes the stage exactly once.
    #[must_use]
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            retry_on: Vec::new(),
            ..Self::default()
        }
    }

    /// Sets the first delay.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_rate(mut self, rate: f64) -> Self {
        self.backoff_rate = rate;
        self
    }

    /// Sets the attempt ceiling.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the delay cap.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Sets the retryable error kinds.
    #[must_use]
    pub fn with_retry_on(mut self, kinds: &[&str]) -> Self {
        self.retry_on = kinds.iter().map(|k| (*k).to_string()).collect();
        self
    }

    /// Returns true if a failed attempt with this error should be retried.
    ///
    /// Fatal kinds (state, configuration, cancellation) are never retried.
    #[must_use]
    pub fn retries(&self, error: &CaptureError) -> bool {
        !error.is_fatal() && self.retry_on.iter().any(|k| k == error.kind())
    }

    /// Delay to wait after the given (1-based) unsuccessful attempt, before jitter.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let scaled = self.interval_ms as f64 * self.backoff_rate.max(1.0).powi(exponent);
        let capped = scaled.min(self.max_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }

    /// Delay to wait after the given attempt, with jitter applied.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let delay = u64::try_from(self.base_delay(attempt).as_millis()).unwrap_or(u64::MAX);
        let jittered = match self.jitter {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if delay == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay)
                }
            }
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
        };
        Duration::from_millis(jittered)
    }

    /// Sum of all base delays the policy can wait, ignoring jitter.
    #[must_use]
    pub fn total_budget(&self) -> Duration {
        (1..self.max_attempts).map(|a| self.base_delay(a)).sum()
    }
}

/// Invokes `attempt` until it completes, fails fatally or the policy gives up.
///
/// The closure receives the 1-based attempt number. Between attempts the
/// executor sleeps for the policy delay; a cancellation of `cancel` ends the
/// wait immediately with [`CaptureError::Cancelled`].
pub async fn poll_until<T, F, Fut>(
    stage: CaptureStage,
    policy: &PollPolicy,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Result<T, CaptureError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = StageResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_reason = String::from("no attempt made");

    for n in 1..=max_attempts {
        if cancel.is_cancelled() {
            return Err(cancelled_error(cancel));
        }

        match attempt(n).await {
            StageResult::Completed(value) => return Ok(value),
            StageResult::Pending(reason) => {
                if !stage.is_asynchronous() {
                    return Err(CaptureError::Internal(format!(
                        "stage {stage} reported pending but is not asynchronous"
                    )));
                }
                debug!(stage = %stage, attempt = n, reason = %reason, "Stage pending");
                last_reason = reason;
            }
            StageResult::Failed(error) => {
                if !(stage.is_retry_eligible() && policy.retries(&error)) {
                    return Err(error);
                }
                debug!(stage = %stage, attempt = n, error = %error, "Retrying after error");
                last_reason = error.to_string();
            }
        }

        if n == max_attempts {
            break;
        }

        let delay = policy.delay(n);
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = cancel.cancelled() => return Err(cancelled_error(cancel)),
        }
    }

    warn!(stage = %stage, attempts = max_attempts, reason = %last_reason, "Retry budget exhausted");
    Err(CaptureError::RetryExhausted {
        stage: stage.to_string(),
        attempts: max_attempts,
        last_reason,
    })
}

/// Runs a stage once, or under `policy` when one is configured for it.
pub async fn run_stage<T, F, Fut>(
    stage: CaptureStage,
    policy: Option<&PollPolicy>,
    cancel: &CancellationToken,
    attempt: F,
) -> Result<T, CaptureError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = StageResult<T>>,
{
    let single = PollPolicy::single_attempt();
    poll_until(stage, policy.unwrap_or(&single), cancel, attempt).await
}

/// Suspends for `delay` unless the token is cancelled first.
pub async fn sleep_or_cancel(
    delay: Duration,
    cancel: &CancellationToken,
) -> Result<(), CaptureError> {
    tokio::select! {
        () = tokio::time::sleep(delay) => Ok(()),
        () = cancel.cancelled() => Err(cancelled_error(cancel)),
    }
}

fn cancelled_error(cancel: &CancellationToken) -> CaptureError {
    CaptureError::cancelled(cancel.reason().unwrap_or_else(|| "cancelled".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(attempts: u32) -> PollPolicy {
        PollPolicy::new()
            .with_interval(Duration::from_millis(10))
            .with_backoff_rate(2.0)
            .with_max_attempts(attempts)
    }

    #[test]
    fn test_default_policy_cadence() {
        let policy = PollPolicy::default();
        assert_eq!(policy.base_delay(1), Duration::from_secs(30));
        assert_eq!(policy.base_delay(2), Duration::from_secs(45));
        // capped at one minute
        assert_eq!(policy.base_delay(3), Duration::from_secs(60));
        assert_eq!(policy.base_delay(14), Duration::from_secs(60));
        assert_eq!(policy.max_attempts, 15);
    }

    #[test]
    fn test_default_budget_fits_incident_timeout() {
        let policy = PollPolicy::default();
        assert_eq!(policy.total_budget(), Duration::from_secs(30 + 45 + 12 * 60));
        assert!(policy.total_budget() + Duration::from_secs(120) < Duration::from_secs(20 * 60));
    }

    #[test]
    fn test_retries_respects_fatal_kinds() {
        let policy = PollPolicy::default().with_retry_on(&["transient_error", "state_error"]);
        assert!(policy.retries(&CaptureError::transient("later")));
        assert!(!policy.retries(&CaptureError::state("snap-1", "error")));
    }

    #[test]
    fn test_equal_jitter_bounds() {
        let policy = fast_policy(3).with_jitter(JitterStrategy::Equal);
        for _ in 0..20 {
            let d = policy.delay(1).as_millis();
            assert!((5..=10).contains(&d));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_then_completed() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let counter = calls.clone();
        let result = poll_until(CaptureStage::ConfirmCopy, &fast_policy(5), &cancel, |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    StageResult::pending("copy pending")
                } else {
                    StageResult::Completed("snap-copy")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "snap-copy");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_error_fails_on_first_observation() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let counter = calls.clone();
        let result: Result<(), _> =
            poll_until(CaptureStage::ConfirmCopy, &fast_policy(60), &cancel, |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { StageResult::Failed(CaptureError::state("snap-1", "error")) }
            })
            .await;

        assert_eq!(result.unwrap_err().kind(), "state_error");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_converts_pending() {
        let cancel = CancellationToken::new();
        let result: Result<(), _> =
            poll_until(CaptureStage::AwaitReadiness, &fast_policy(4), &cancel, |_| async {
                StageResult::pending("booting")
            })
            .await;

        match result.unwrap_err() {
            CaptureError::RetryExhausted {
                stage,
                attempts,
                last_reason,
            } => {
                assert_eq!(stage, "await_readiness");
                assert_eq!(attempts, 4);
                assert_eq!(last_reason, "booting");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_retried_only_for_eligible_stage() {
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let result: Result<(), _> =
            poll_until(CaptureStage::ShareSnapshot, &fast_policy(5), &cancel, |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { StageResult::Failed(CaptureError::transient("throttled")) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let counter = calls.clone();
        let result = poll_until(CaptureStage::CopySnapshot, &fast_policy(5), &cancel, |n| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    StageResult::Failed(CaptureError::transient("not visible"))
                } else {
                    StageResult::Completed(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_from_synchronous_stage_is_rejected() {
        let cancel = CancellationToken::new();
        let result: Result<(), _> =
            poll_until(CaptureStage::CreateVolume, &fast_policy(5), &cancel, |_| async {
                StageResult::pending("?")
            })
            .await;
        assert_eq!(result.unwrap_err().kind(), "internal_error");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_wait() {
        let cancel = Arc::new(CancellationToken::new());
        let policy = PollPolicy::default();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                cancel.cancel("global timeout");
            })
        };

        let result: Result<(), _> =
            poll_until(CaptureStage::AwaitReadiness, &policy, &cancel, |_| async {
                StageResult::pending("booting")
            })
            .await;

        canceller.await.unwrap();
        match result.unwrap_err() {
            CaptureError::Cancelled { reason } => assert_eq!(reason, "global timeout"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_run_stage_without_policy_is_single_attempt() {
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = run_stage(CaptureStage::CopySnapshot, None, &cancel, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { StageResult::Failed(CaptureError::transient("not visible")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
