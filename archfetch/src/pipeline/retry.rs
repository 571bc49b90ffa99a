//! Retry budget and backoff for archive acquisition.
//!
//! A group owns one [`RetryState`]. Every transfer attempt consumes one unit,
//! whether it follows a failed transfer or a corrupt local copy, so the
//! total number of transfers per group never exceeds `max_attempts`.

use std::time::Duration;

// =============================================================================
// Retry Constants
// =============================================================================

/// Default transfer attempts per group.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Default delay after the first failed transfer (1 second).
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

/// Default cap on the retry delay (30 seconds).
pub const DEFAULT_RETRY_MAX_DELAY_SECS: u64 = 30;

/// Per-group transfer attempt counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    max_attempts: u32,
    attempts: u32,
    failures: u32,
}

impl RetryState {
    /// Create a budget of `max_attempts` transfers (minimum 1).
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            attempts: 0,
            failures: 0,
        }
    }

    /// Consume one unit for a new transfer attempt.
    ///
    /// Returns `false` when the budget is already spent.
    pub fn try_begin_attempt(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.attempts += 1;
        true
    }

    /// Record a failed transfer and return the failure count so far.
    pub fn record_failure(&mut self) -> u32 {
        self.failures += 1;
        self.failures
    }

    /// Whether no attempts remain.
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Transfers started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Failed transfers so far.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Budget size.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Exponential delay between failed transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            Duration::from_secs(DEFAULT_RETRY_MAX_DELAY_SECS),
        )
    }
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// No delay at all.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Delay after the `failure`-th failed transfer (1-based).
    ///
    /// `base * 2^(failure - 1)`, capped at the maximum.
    pub fn delay_for_failure(&self, failure: u32) -> Duration {
        let exponent = failure.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max)
    }

    /// Sleep for the delay after the `failure`-th failed transfer.
    pub fn wait(&self, failure: u32) {
        let delay = self.delay_for_failure(failure);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}
