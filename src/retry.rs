/// Retry policy for verification polling.
///
/// Explorers index new transactions with a delay, so the first lookups
/// after a broadcast routinely miss. The policy decides how many polls to
/// make and how long to wait between them. It never sleeps after the final
/// attempt.
use std::time::Duration;

/// Delay schedule between attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// Same delay between every pair of attempts.
    Fixed(Duration),
    /// `initial * multiplier^(n-1)`, capped at `max`.
    Exponential {
        initial: Duration,
        max: Duration,
        multiplier: f64,
    },
}

/// How many times to poll and how long to wait in between.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    /// 6 attempts, 1 second apart.
    fn default() -> Self {
        Self::fixed(6, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(interval),
        }
    }

    pub fn exponential(
        max_attempts: u32,
        initial: Duration,
        max: Duration,
        multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential {
                initial,
                max,
                multiplier,
            },
        }
    }

    /// Single attempt, no waiting.
    pub fn once() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Attempts actually made (at least one).
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay after failed attempt `attempt` (1-based), `None` after the last.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.attempts() {
            return None;
        }
        Some(match &self.backoff {
            Backoff::Fixed(interval) => *interval,
            Backoff::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let factor = multiplier.max(1.0).powi(attempt.saturating_sub(1) as i32);
                let secs = (initial.as_secs_f64() * factor).min(max.as_secs_f64());
                Duration::from_secs_f64(secs)
            }
        })
    }

    /// Sum of all delays if every attempt fails.
    pub fn worst_case_wait(&self) -> Duration {
        (1..self.attempts()).filter_map(|a| self.delay_after(a)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts(), 6);
        assert_eq!(policy.delay_after(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_after(5), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_after(6), None);
        assert_eq!(policy.worst_case_wait(), Duration::from_secs(5));
    }

    #[test]
    fn test_exponential_capped() {
        let policy = RetryPolicy::exponential(
            5,
            Duration::from_millis(500),
            Duration::from_secs(2),
            2.0,
        );
        assert_eq!(policy.delay_after(1), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_after(3), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_after(4), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_after(5), None);
    }

    #[test]
    fn test_zero_attempts_still_polls_once() {
        let policy = RetryPolicy::fixed(0, Duration::from_secs(1));
        assert_eq!(policy.attempts(), 1);
        assert_eq!(policy.delay_after(1), None);
        assert_eq!(policy.worst_case_wait(), Duration::ZERO);
    }
}
