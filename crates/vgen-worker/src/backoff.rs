//! Backoff policies for submission retries and idle polling.

use std::time::Duration;

/// Exponential backoff with a hard ceiling.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Delay after the first failure
    pub base: Duration,
    /// Ceiling no delay exceeds
    pub cap: Duration,
}

impl BackoffPolicy {
    pub const fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Delay for a 0-based attempt index: `min(base * 2^attempt, cap)`,
    /// saturating instead of overflowing.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base.saturating_mul(factor).min(self.cap)
    }
}

/// Delay before re-running a failed submission attempt.
///
/// A rate-limited attempt never retries sooner than `rate_limit_floor`, and
/// honors a longer server-suggested delay when one was sent.
pub fn submission_retry_delay(
    policy: &BackoffPolicy,
    attempt: u32,
    rate_limited: bool,
    rate_limit_floor: Duration,
    server_hint: Option<Duration>,
) -> Duration {
    let mut delay = policy.delay_for_attempt(attempt);
    if rate_limited {
        delay = delay.max(rate_limit_floor);
        if let Some(hint) = server_hint {
            delay = delay.max(hint);
        }
    }
    delay
}

/// Mutable idle-poll backoff: grows while the queue stays empty, resets
/// to the base after a successful dequeue or a wake event.
#[derive(Debug)]
pub struct IdleBackoff {
    policy: BackoffPolicy,
    current: Duration,
}

impl IdleBackoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            current: policy.base,
        }
    }

    /// Current delay; doubles the stored delay toward the cap for the
    /// next call.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.policy.cap);
        delay
    }

    /// Drop back to the base delay.
    pub fn reset(&mut self) {
        self.current = self.policy.base;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BackoffPolicy {
        BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(150))
    }

    #[test]
    fn delays_double_until_the_cap() {
        let p = policy();
        assert_eq!(p.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(p.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(p.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(p.delay_for_attempt(3), Duration::from_secs(8));
        assert_eq!(p.delay_for_attempt(7), Duration::from_secs(128));
        assert_eq!(p.delay_for_attempt(8), Duration::from_secs(150));
        assert_eq!(p.delay_for_attempt(60), Duration::from_secs(150));
    }

    #[test]
    fn delays_are_monotonically_nondecreasing() {
        let p = policy();
        let mut previous = Duration::ZERO;
        for attempt in 0..64 {
            let delay = p.delay_for_attempt(attempt);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn rate_limit_floor_overrides_a_short_computed_delay() {
        // First-attempt delay would be 1s; a throttled attempt must wait
        // at least the floor.
        let delay = submission_retry_delay(
            &policy(),
            0,
            true,
            Duration::from_secs(10),
            None,
        );
        assert_eq!(delay, Duration::from_secs(10));
    }

    #[test]
    fn server_hint_extends_past_the_floor() {
        let delay = submission_retry_delay(
            &policy(),
            0,
            true,
            Duration::from_secs(10),
            Some(Duration::from_secs(15)),
        );
        assert_eq!(delay, Duration::from_secs(15));
    }

    #[test]
    fn floor_is_ignored_when_not_rate_limited() {
        let delay = submission_retry_delay(
            &policy(),
            0,
            false,
            Duration::from_secs(10),
            None,
        );
        assert_eq!(delay, Duration::from_secs(1));
    }

    #[test]
    fn late_attempts_exceed_the_floor_on_their_own() {
        let delay = submission_retry_delay(
            &policy(),
            4,
            true,
            Duration::from_secs(10),
            None,
        );
        assert_eq!(delay, Duration::from_secs(16));
    }

    #[test]
    fn idle_backoff_grows_and_resets() {
        let mut idle = IdleBackoff::new(BackoffPolicy::new(
            Duration::from_secs(2),
            Duration::from_secs(30),
        ));

        assert_eq!(idle.next_delay(), Duration::from_secs(2));
        assert_eq!(idle.next_delay(), Duration::from_secs(4));
        assert_eq!(idle.next_delay(), Duration::from_secs(8));
        assert_eq!(idle.next_delay(), Duration::from_secs(16));
        assert_eq!(idle.next_delay(), Duration::from_secs(30));
        assert_eq!(idle.next_delay(), Duration::from_secs(30));

        idle.reset();
        assert_eq!(idle.next_delay(), Duration::from_secs(2));
    }
}
