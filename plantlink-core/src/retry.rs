//! Scheduled retry bookkeeping
//!
//! The reconnect state machine never sleeps inside a connect attempt.
//! Instead each failed attempt records a deadline in a [`RetrySchedule`],
//! and the next attempt is refused until that deadline has passed. The
//! caller decides how to wait (an async timer, a low-power tick, ...), so
//! a backoff on the network side never stalls the sampling side.
//!
//! ```
//! use plantlink_core::retry::{RetryPolicy, RetrySchedule};
//!
//! let mut schedule = RetrySchedule::new(RetryPolicy::fixed(500));
//! assert!(schedule.is_ready(0));
//!
//! schedule.record_failure(1_000);
//! assert!(!schedule.is_ready(1_499));
//! assert!(schedule.is_ready(1_500));
//! ```

use crate::time::Timestamp;

/// How the delay grows with consecutive failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BackoffStrategy {
    /// Same delay after every failure
    Fixed,
    /// Delay doubles per consecutive failure, capped at `max_ms`
    Exponential,
}

/// Retry delay policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RetryPolicy {
    /// Delay after the first failure
    pub base_ms: u64,
    /// Ceiling for exponential growth
    pub max_ms: u64,
    /// Growth strategy
    pub strategy: BackoffStrategy,
}

impl RetryPolicy {
    /// Constant delay of `delay_ms`
    pub const fn fixed(delay_ms: u64) -> Self {
        Self {
            base_ms: delay_ms,
            max_ms: delay_ms,
            strategy: BackoffStrategy::Fixed,
        }
    }

    /// Doubling delay starting at `base_ms`, never above `max_ms`
    pub const fn exponential(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms,
            strategy: BackoffStrategy::Exponential,
        }
    }

    /// Delay to apply after the `failures`-th consecutive failure (1-based)
    pub fn delay_for(&self, failures: u32) -> u64 {
        match self.strategy {
            BackoffStrategy::Fixed => self.base_ms,
            BackoffStrategy::Exponential => {
                let shift = failures.saturating_sub(1).min(32);
                self.base_ms
                    .saturating_mul(1u64 << shift)
                    .min(self.max_ms.max(self.base_ms))
            }
        }
    }
}

/// Tracks consecutive failures and the earliest permitted next attempt
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    policy: RetryPolicy,
    failures: u32,
    not_before: Option<Timestamp>,
}

impl RetrySchedule {
    /// Fresh schedule; the first attempt is allowed immediately
    pub const fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            failures: 0,
            not_before: None,
        }
    }

    /// Whether an attempt is permitted at `now`
    pub fn is_ready(&self, now: Timestamp) -> bool {
        self.not_before.map_or(true, |deadline| now >= deadline)
    }

    /// Record a failed attempt at `now`; returns the delay applied
    pub fn record_failure(&mut self, now: Timestamp) -> u64 {
        self.failures = self.failures.saturating_add(1);
        let delay = self.policy.delay_for(self.failures);
        self.not_before = Some(now.saturating_add(delay));
        delay
    }

    /// Clear failures after a success
    pub fn reset(&mut self) {
        self.failures = 0;
        self.not_before = None;
    }

    /// Earliest timestamp at which the next attempt is permitted
    pub fn not_before(&self) -> Option<Timestamp> {
        self.not_before
    }

    /// Milliseconds until the next attempt is permitted
    pub fn remaining(&self, now: Timestamp) -> u64 {
        self.not_before.map_or(0, |deadline| deadline.saturating_sub(now))
    }

    /// Consecutive failures since the last success
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Policy in use
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}
