//! Retry policy and backoff state machine
//!
//! Both clients drive the same [`RetryState`]: after each failed attempt they
//! ask it for a [`RetryDecision`], then either sleep for the returned delay or
//! surface the error. Keeping the decision pure makes attempt counting and
//! delay bounds testable without a network.

use crate::error::Error;
use crate::types::BackoffType;
use rand::Rng;
use std::time::Duration;

/// Retry configuration shared by the blocking and async clients
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound for the computed (pre-jitter) delay
    pub max_backoff: Duration,
    /// Growth of the delay between attempts
    pub backoff_type: BackoffType,
    /// Upper bound of the uniform random jitter added to each delay
    pub jitter: Duration,
    /// Give up instead of waiting when the server asks for a longer
    /// `Retry-After` than this. `None` always honours the header.
    pub max_retry_after: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            backoff_type: BackoffType::Exponential,
            jitter: Duration::from_millis(300),
            max_retry_after: None,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Set max retries
    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set backoff configuration
    #[must_use]
    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.backoff_type = backoff_type;
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Set jitter bound
    #[must_use]
    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Give up when the server asks to wait longer than `max`
    #[must_use]
    pub fn max_retry_after(mut self, max: Duration) -> Self {
        self.max_retry_after = Some(max);
        self
    }

    /// Total attempts including the first one
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Calculate backoff delay (without jitter) for a given retry number
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let delay = match self.backoff_type {
            BackoffType::Constant => self.initial_backoff,
            BackoffType::Linear => self.initial_backoff.saturating_mul(attempt.saturating_add(1)),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(attempt);
                self.initial_backoff.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.max_backoff)
    }

    /// Longest wall-clock time one `request` call can take
    ///
    /// Every attempt is bounded by `timeout`, and every gap between attempts
    /// by the larger of `max_backoff + jitter` and `max_retry_after`, so the
    /// bound is `timeout * attempts + retries * gap`. Without a
    /// `max_retry_after` the server controls the gaps and there is no bound
    /// once retries are allowed.
    pub fn worst_case_duration(&self, timeout: Duration) -> Option<Duration> {
        let attempts = timeout.saturating_mul(self.max_attempts());
        if self.max_retries == 0 {
            return Some(attempts);
        }
        let gap = std::cmp::max(
            self.max_backoff.saturating_add(self.jitter),
            self.max_retry_after?,
        );
        Some(attempts.saturating_add(gap.saturating_mul(self.max_retries)))
    }

    /// Start a fresh retry state for one request
    pub fn start(&self) -> RetryState<'_> {
        RetryState {
            policy: self,
            attempt: 0,
            last_delay: Duration::ZERO,
        }
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for this long, then try again
    Retry(Duration),
    /// Surface the error
    GiveUp,
}

/// Per-request retry bookkeeping
#[derive(Debug, Clone)]
pub struct RetryState<'a> {
    policy: &'a RetryPolicy,
    attempt: u32,
    last_delay: Duration,
}

impl RetryState<'_> {
    /// Attempts made so far
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Record a failed attempt and decide whether to retry, with random jitter
    pub fn next(&mut self, error: &Error, retry_after: Option<Duration>) -> RetryDecision {
        let jitter = random_jitter(self.policy.jitter);
        self.next_with_jitter(error, retry_after, jitter)
    }

    /// Record a failed attempt and decide whether to retry
    ///
    /// The returned delay is never shorter than `retry_after` nor than the
    /// previous delay.
    pub fn next_with_jitter(
        &mut self,
        error: &Error,
        retry_after: Option<Duration>,
        jitter: Duration,
    ) -> RetryDecision {
        let retry_number = self.attempt;
        self.attempt = self.attempt.saturating_add(1);

        if !error.is_retryable() || retry_number >= self.policy.max_retries {
            return RetryDecision::GiveUp;
        }

        let retry_after = retry_after.or_else(|| match error {
            Error::RateLimited { retry_after } => *retry_after,
            _ => None,
        });
        if let (Some(wait), Some(max)) = (retry_after, self.policy.max_retry_after) {
            if wait > max {
                return RetryDecision::GiveUp;
            }
        }

        let jitter = std::cmp::min(jitter, self.policy.jitter);
        let mut delay = self
            .policy
            .calculate_backoff(retry_number)
            .saturating_add(jitter);
        if let Some(floor) = retry_after {
            delay = std::cmp::max(delay, floor);
        }
        delay = std::cmp::max(delay, self.last_delay);

        self.last_delay = delay;
        RetryDecision::Retry(delay)
    }
}

fn random_jitter(bound: Duration) -> Duration {
    if bound.is_zero() {
        return Duration::ZERO;
    }
    let millis = bound.as_millis() as u64;
    Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_error() -> Error {
        Error::ServerError {
            status: 503,
            body: String::new(),
        }
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.backoff_type, BackoffType::Exponential);
    }

    #[test]
    fn test_calculate_backoff_constant() {
        let policy = RetryPolicy::default().backoff(
            BackoffType::Constant,
            Duration::from_millis(100),
            Duration::from_secs(10),
        );

        assert_eq!(policy.calculate_backoff(0), Duration::from_millis(100));
        assert_eq!(policy.calculate_backoff(1), Duration::from_millis(100));
        assert_eq!(policy.calculate_backoff(5), Duration::from_millis(100));
    }

    #[test]
    fn test_calculate_backoff_linear() {
        let policy = RetryPolicy::default().backoff(
            BackoffType::Linear,
            Duration::from_millis(100),
            Duration::from_secs(10),
        );

        assert_eq!(policy.calculate_backoff(0), Duration::from_millis(100));
        assert_eq!(policy.calculate_backoff(1), Duration::from_millis(200));
        assert_eq!(policy.calculate_backoff(2), Duration::from_millis(300));
    }

    #[test]
    fn test_calculate_backoff_exponential() {
        let policy = RetryPolicy::default().backoff(
            BackoffType::Exponential,
            Duration::from_millis(100),
            Duration::from_secs(10),
        );

        assert_eq!(policy.calculate_backoff(0), Duration::from_millis(100));
        assert_eq!(policy.calculate_backoff(1), Duration::from_millis(200));
        assert_eq!(policy.calculate_backoff(2), Duration::from_millis(400));
        assert_eq!(policy.calculate_backoff(3), Duration::from_millis(800));
    }

    #[test]
    fn test_calculate_backoff_respects_max() {
        let policy = RetryPolicy::default().backoff(
            BackoffType::Exponential,
            Duration::from_millis(100),
            Duration::from_millis(500),
        );

        assert_eq!(policy.calculate_backoff(10), Duration::from_millis(500));
        assert_eq!(policy.calculate_backoff(40), Duration::from_millis(500));
    }

    #[test]
    fn test_gives_up_after_max_retries() {
        let policy = RetryPolicy::default().jitter(Duration::ZERO);
        let mut state = policy.start();
        let err = server_error();

        for _ in 0..3 {
            assert!(matches!(state.next(&err, None), RetryDecision::Retry(_)));
        }
        assert_eq!(state.next(&err, None), RetryDecision::GiveUp);
        assert_eq!(state.attempts(), 4);
    }

    #[test]
    fn test_non_retryable_gives_up_immediately() {
        let policy = RetryPolicy::default();
        let mut state = policy.start();
        let err = Error::NotFound {
            body: String::new(),
        };

        assert_eq!(state.next(&err, None), RetryDecision::GiveUp);
        assert_eq!(state.attempts(), 1);
    }

    #[test]
    fn test_delays_non_decreasing_with_jitter() {
        let policy = RetryPolicy::default()
            .max_retries(10)
            .backoff(
                BackoffType::Exponential,
                Duration::from_millis(100),
                Duration::from_millis(400),
            )
            .jitter(Duration::from_millis(300));
        let mut state = policy.start();
        let err = server_error();

        // Largest jitter first, then none: the floor must still hold.
        let jitters = [300, 0, 0, 150, 0, 300, 0, 0, 0, 10];
        let mut previous = Duration::ZERO;
        for jitter in jitters {
            match state.next_with_jitter(&err, None, Duration::from_millis(jitter)) {
                RetryDecision::Retry(delay) => {
                    assert!(delay >= previous, "{delay:?} < {previous:?}");
                    assert!(delay <= Duration::from_millis(700));
                    previous = delay;
                }
                RetryDecision::GiveUp => panic!("gave up early"),
            }
        }
    }

    #[test]
    fn test_random_jitter_within_bound() {
        let policy = RetryPolicy::default()
            .max_retries(50)
            .backoff(
                BackoffType::Constant,
                Duration::from_millis(10),
                Duration::from_millis(10),
            )
            .jitter(Duration::from_millis(20));
        let mut state = policy.start();
        let err = server_error();

        for _ in 0..50 {
            match state.next(&err, None) {
                RetryDecision::Retry(delay) => {
                    assert!(delay >= Duration::from_millis(10));
                    assert!(delay <= Duration::from_millis(30));
                }
                RetryDecision::GiveUp => panic!("gave up early"),
            }
        }
    }

    #[test]
    fn test_retry_after_is_lower_bound() {
        let policy = RetryPolicy::default()
            .backoff(
                BackoffType::Exponential,
                Duration::from_millis(10),
                Duration::from_secs(1),
            )
            .jitter(Duration::ZERO);
        let mut state = policy.start();

        let err = Error::RateLimited {
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(
            state.next(&err, None),
            RetryDecision::Retry(Duration::from_secs(2))
        );

        // Explicit header value wins over the error payload, and later delays
        // do not drop below earlier ones.
        assert_eq!(
            state.next(&server_error(), Some(Duration::from_millis(50))),
            RetryDecision::Retry(Duration::from_secs(2))
        );
    }

    #[test]
    fn test_long_retry_after_is_honoured_by_default() {
        let policy = RetryPolicy::default().jitter(Duration::ZERO);
        let mut state = policy.start();
        let err = Error::RateLimited {
            retry_after: Some(Duration::from_secs(3600)),
        };

        assert_eq!(policy.max_retry_after, None);
        assert_eq!(
            state.next(&err, None),
            RetryDecision::Retry(Duration::from_secs(3600))
        );
        assert_eq!(
            state.next(&err, None),
            RetryDecision::Retry(Duration::from_secs(3600))
        );
    }

    #[test]
    fn test_excessive_retry_after_gives_up_when_capped() {
        let policy = RetryPolicy::default().max_retry_after(Duration::from_secs(5));
        let mut state = policy.start();
        let err = Error::RateLimited {
            retry_after: Some(Duration::from_secs(3600)),
        };
        assert_eq!(state.next(&err, None), RetryDecision::GiveUp);
    }

    #[test]
    fn test_worst_case_duration() {
        let policy = RetryPolicy::default()
            .backoff(
                BackoffType::Exponential,
                Duration::from_secs(1),
                Duration::from_secs(4),
            )
            .jitter(Duration::from_secs(1))
            .max_retry_after(Duration::from_secs(3));

        // 4 attempts x 10s + 3 gaps x max(4s + 1s, 3s)
        assert_eq!(
            policy.worst_case_duration(Duration::from_secs(10)),
            Some(Duration::from_secs(55))
        );
        assert_eq!(
            RetryPolicy::none().worst_case_duration(Duration::from_secs(10)),
            Some(Duration::from_secs(10))
        );
        assert_eq!(
            RetryPolicy::default().worst_case_duration(Duration::from_secs(10)),
            None
        );
    }
}
