//! Retry policy for control-plane requests.

use std::time::Duration;

/// How the wait between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same wait before every retry.
    Fixed,
    /// `wait = wait * interval + interval`, with the interval in seconds.
    ///
    /// For a 2 s interval the waits are 2, 6, 14, 30 s.
    Compound,
}

/// Bounded retry with a backoff schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Never less than 1.
    pub max_attempts: u32,
    pub interval: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    /// 5 attempts, 2 s interval, compound backoff.
    fn default() -> Self {
        Self {
            max_attempts: 5,
            interval: Duration::from_secs(2),
            backoff: Backoff::Compound,
        }
    }
}

impl RetryPolicy {
    /// Exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            interval: Duration::ZERO,
            backoff: Backoff::Fixed,
        }
    }

    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
            backoff: Backoff::Fixed,
        }
    }

    pub fn compound(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
            backoff: Backoff::Compound,
        }
    }

    /// Waits between consecutive attempts (`max_attempts - 1` of them).
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        let step = self.interval.as_secs_f64();
        let mut wait = 0.0_f64;
        (1..self.max_attempts.max(1)).map(move |_| {
            wait = match self.backoff {
                Backoff::Fixed => step,
                Backoff::Compound => wait * step + step,
            };
            Duration::from_secs_f64(wait)
        })
    }
}
