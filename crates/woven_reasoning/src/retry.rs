//! Retry logic with exponential backoff for generation calls.
//!
//! Retries on rate limits (429, with a longer wait) and transient failures
//! (5xx, timeouts, network errors). Fatal errors (400, 401, 403, 404, bad
//! payloads) abort immediately.

use crate::llm::{GenerationError, GenerationParams, TextGenerator};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use woven_core::config::RetrySettings;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for each subsequent delay.
    pub backoff_factor: f64,
    /// Extra multiplier when the last failure was a rate limit and the server
    /// gave no `Retry-After` hint.
    pub rate_limit_factor: f64,
    /// Add up to 500ms of random jitter to each wait.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(s: &RetrySettings) -> Self {
        Self {
            max_attempts: s.max_attempts.max(1),
            initial_delay: Duration::from_millis(s.initial_delay_ms),
            max_delay: Duration::from_millis(s.max_delay_ms),
            backoff_factor: s.backoff_factor.max(1.0),
            rate_limit_factor: s.rate_limit_factor.max(1.0),
            jitter: s.jitter,
        }
    }
}

impl RetryPolicy {
    /// A policy that never waits. Handy for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_factor: 1.0,
            rate_limit_factor: 1.0,
            jitter: false,
        }
    }

    /// Backoff delay after the given (1-based) failed attempt, before jitter.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(30) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }

    /// How long to wait after `err` on `attempt`. Rate limits honor the
    /// server hint, otherwise wait `rate_limit_factor` times the backoff
    /// delay; the rate-limit wait is not capped by `max_delay`.
    pub fn delay_for(&self, attempt: u32, err: &GenerationError) -> Duration {
        let base = self.backoff_delay(attempt);
        match err {
            GenerationError::RateLimited {
                retry_after: Some(hint),
                ..
            } => (*hint).max(base),
            GenerationError::RateLimited { .. } => base.mul_f64(self.rate_limit_factor),
            _ => base,
        }
    }
}

/// Run `operation` until it succeeds, fails fatally, or `max_attempts` is
/// exhausted.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    provider_name: &str,
    operation: F,
) -> Result<T, GenerationError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, GenerationError>>,
{
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!("{} succeeded on attempt {}", provider_name, attempt);
                }
                return Ok(value);
            }
            Err(e) if !e.is_retryable() => {
                tracing::warn!("{} failed with non-retryable error: {}", provider_name, e);
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(
                    "{} error on attempt {}/{}: {}",
                    provider_name,
                    attempt,
                    policy.max_attempts,
                    e
                );
                if attempt < policy.max_attempts {
                    let mut sleep_time = policy.delay_for(attempt, &e);
                    if policy.jitter {
                        sleep_time += Duration::from_millis(rand::thread_rng().gen_range(0..500));
                    }
                    tracing::info!(
                        "{} retrying in {:.1}s (attempt {}/{})",
                        provider_name,
                        sleep_time.as_secs_f64(),
                        attempt + 1,
                        policy.max_attempts
                    );
                    tokio::time::sleep(sleep_time).await;
                }
                last_error = Some(e);
            }
        }
    }

    let last = last_error.unwrap_or_else(|| GenerationError::Fatal("no attempts made".into()));
    Err(GenerationError::Exhausted {
        attempts: policy.max_attempts,
        last: Box::new(last),
    })
}

/// Wraps any [`TextGenerator`] with a [`RetryPolicy`].
pub struct RetryingGenerator {
    inner: Arc<dyn TextGenerator>,
    policy: RetryPolicy,
}

impl RetryingGenerator {
    pub fn new(inner: Arc<dyn TextGenerator>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl TextGenerator for RetryingGenerator {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError> {
        with_retry(&self.policy, self.inner.name(), || {
            self.inner.generate(system, prompt, params)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
            rate_limit_factor: 3.0,
            jitter: false,
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let p = policy();
        assert_eq!(p.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(p.backoff_delay(2), Duration::from_secs(4));
        assert_eq!(p.backoff_delay(3), Duration::from_secs(8));
        assert_eq!(p.backoff_delay(4), Duration::from_secs(10));
    }

    #[test]
    fn test_rate_limit_waits_longer() {
        let p = policy();
        let transient = GenerationError::Transient("boom".into());
        let limited = GenerationError::RateLimited {
            message: "429".into(),
            retry_after: None,
        };
        assert_eq!(p.delay_for(1, &transient), Duration::from_secs(2));
        assert_eq!(p.delay_for(1, &limited), Duration::from_secs(6));

        let hinted = GenerationError::RateLimited {
            message: "429".into(),
            retry_after: Some(Duration::from_secs(30)),
        };
        assert_eq!(p.delay_for(1, &hinted), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_then_succeeds() {
        let calls = &AtomicU32::new(0);
        let started = tokio::time::Instant::now();
        let result = with_retry(&policy(), "test", || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(GenerationError::Transient("503".into()))
            } else {
                Ok("reply")
            }
        })
        .await;
        assert_eq!(result.unwrap(), "reply");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 2s + 4s of backoff on the paused clock
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(6) && waited < Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_aborts_immediately() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&policy(), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(GenerationError::Fatal("401".into()))
        })
        .await;
        assert_eq!(result, Err(GenerationError::Fatal("401".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempt_ceiling() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&policy(), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(GenerationError::RateLimited {
                message: "429".into(),
                retry_after: None,
            })
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(GenerationError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 4);
                assert!(last.is_rate_limit());
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }
}
