//! Reconnection policy with exponential backoff.

use std::time::Duration;

/// How a connection retries after its transport fails.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Maximum number of consecutive failed attempts (`None` = unlimited).
    pub max_retries: Option<u32>,
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound for the delay.
    pub max_delay: Duration,
    /// Factor applied to the delay after each failure.
    pub backoff_multiplier: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectPolicy {
    /// Sets the maximum retry count.
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = Some(max);
        self
    }

    /// Starts a fresh backoff sequence.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: self.clone(),
            attempts: 0,
            current: self.initial_delay,
        }
    }
}

/// Mutable state of one backoff sequence.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempts: u32,
    current: Duration,
}

impl Backoff {
    /// Delay to wait before the next attempt, or `None` once retries are
    /// exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.policy.max_retries
            && self.attempts >= max
        {
            return None;
        }
        self.attempts += 1;
        let delay = self.current;
        let next = self.current.as_secs_f64() * self.policy.backoff_multiplier;
        self.current = Duration::from_secs_f64(next.min(self.policy.max_delay.as_secs_f64()));
        Some(delay.min(self.policy.max_delay))
    }

    /// Failed attempts since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Resets after a successful connection.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.current = self.policy.initial_delay;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = ReconnectPolicy {
            max_retries: None,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        };
        let mut backoff = policy.backoff();
        let delays: Vec<u64> = (0..5)
            .filter_map(|_| backoff.next_delay())
            .map(|d| d.as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 5, 5]);
    }

    #[test]
    fn test_backoff_exhausts_and_resets() {
        let mut backoff = ReconnectPolicy::default().with_max_retries(2).backoff();
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());
        assert_eq!(backoff.attempts(), 2);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(1)));
    }
}
