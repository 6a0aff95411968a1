//! Retry/backoff engine: runs an async operation under a [`RetryPolicy`],
//! classifying each failure and sleeping with exponential backoff and
//! jitter between attempts.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use types::ErrorKind;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_fraction: f64,
    /// Error kinds eligible for retry, in addition to `ErrorKind`'s own
    /// default classification.
    pub retryable_kinds: Vec<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5_000,
            backoff_multiplier: 2.0,
            jitter_fraction: 0.2,
            retryable_kinds: vec![ErrorKind::Transient],
        }
    }
}

impl RetryPolicy {
    fn is_retryable(&self, kind: ErrorKind) -> bool {
        kind.is_retryable_by_default() || self.retryable_kinds.contains(&kind)
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms =
            self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let capped_ms = base_ms.min(self.max_delay_ms as f64);
        let jitter = rand::thread_rng().gen_range(-self.jitter_fraction..=self.jitter_fraction);
        Duration::from_millis((capped_ms * (1.0 + jitter)).max(0.0) as u64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryError<E> {
    /// The operation's last attempt failed with this error, and it was
    /// either non-retryable or the attempt budget was exhausted.
    Failed(E),
    /// Cancelled before or during an attempt; no attempts remain.
    Cancelled,
}

/// Classifies a failure for the policy. Operations that don't already
/// produce a `types::ErrorKind` implement this to opt into retry semantics.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

/// Runs `op` under `policy`. `op` is invoked once per attempt; between
/// retryable failures the engine sleeps `min(maxDelay, initial * mult^(n-1))
/// * (1 +/- jitter)`. Cancellation is checked before each attempt and during
/// the sleep; a cancelled run yields `RetryError::Cancelled` without a
/// further attempt.
pub async fn execute<F, Fut, T, E>(
    mut op: F,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify,
{
    let mut attempt = 0;

    loop {
        attempt += 1;
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                let kind = error.kind();
                if !policy.is_retryable(kind) || attempt >= policy.max_attempts {
                    return Err(RetryError::Failed(error));
                }

                let delay = policy.delay_for_attempt(attempt);
                tracing::debug!(attempt, ?delay, ?kind, "retrying after failure");

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    struct Failure(ErrorKind);

    impl Classify for Failure {
        fn kind(&self) -> ErrorKind {
            self.0
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            initial_delay_ms: 1,
            max_delay_ms: 2,
            ..RetryPolicy::default()
        };
        let cancel = CancellationToken::new();

        let result = execute(
            || async {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(Failure(ErrorKind::Transient))
                } else {
                    Ok(42)
                }
            },
            &policy,
            &cancel,
        )
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_kind_fails_on_first_attempt() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();

        let result: Result<(), _> = execute(
            || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(Failure(ErrorKind::InvalidInput))
            },
            &policy,
            &cancel,
        )
        .await;

        assert_eq!(result, Err(RetryError::Failed(Failure(ErrorKind::InvalidInput))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pre_cancelled_token_yields_cancelled_without_attempting() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<(), _> = execute(
            || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(Failure(ErrorKind::Transient))
            },
            &policy,
            &cancel,
        )
        .await;

        assert_eq!(result, Err(RetryError::Cancelled));
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exhausts_attempt_budget() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 2,
            initial_delay_ms: 1,
            max_delay_ms: 1,
            ..RetryPolicy::default()
        };
        let cancel = CancellationToken::new();

        let result: Result<(), _> = execute(
            || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(Failure(ErrorKind::Transient))
            },
            &policy,
            &cancel,
        )
        .await;

        assert!(matches!(result, Err(RetryError::Failed(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
