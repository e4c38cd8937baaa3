//! # Reconnect Policy
//!
//! Fixed-delay retry after a robot link failure.
//!
//! ```text
//!   Idle --schedule()--> PendingRetry --fire(token)--> Idle
//!                             |
//!                         cancel()
//!                             v
//!                           Idle
//! ```
//!
//! Scheduling while a retry is pending is a no-op, so overlapping failures
//! (a read error and a write error for the same dead link) produce exactly
//! one retry.

use std::time::Duration;

/// Default delay before re-opening the last known address
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(2000);

/// Identity of one scheduled retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryToken(u64);

/// Reconnect state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectState {
    Idle,
    PendingRetry(RetryToken),
}

/// Single-slot retry scheduler
#[derive(Debug)]
pub struct ReconnectPolicy {
    delay: Duration,
    state: ReconnectState,
    next_token: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectPolicy {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: ReconnectState::Idle,
            next_token: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn state(&self) -> ReconnectState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, ReconnectState::PendingRetry(_))
    }

    /// Request a retry
    ///
    /// Returns the token of the new retry, or `None` if one is already
    /// pending and nothing new needs to be scheduled.
    ///
    /// # Examples
    ///
    /// ```
    /// use armlink::reconnect::ReconnectPolicy;
    ///
    /// let mut policy = ReconnectPolicy::default();
    /// let token = policy.schedule().unwrap();
    /// assert!(policy.schedule().is_none());
    /// assert!(policy.fire(token));
    /// ```
    pub fn schedule(&mut self) -> Option<RetryToken> {
        if self.is_pending() {
            return None;
        }
        self.next_token += 1;
        let token = RetryToken(self.next_token);
        self.state = ReconnectState::PendingRetry(token);
        Some(token)
    }

    /// The retry timer for `token` elapsed
    ///
    /// Returns `true` if the retry should be attempted now. A cancelled or
    /// superseded token returns `false`.
    pub fn fire(&mut self, token: RetryToken) -> bool {
        if self.state == ReconnectState::PendingRetry(token) {
            self.state = ReconnectState::Idle;
            true
        } else {
            false
        }
    }

    /// Drop any pending retry (link came up or the user disconnected)
    pub fn cancel(&mut self) {
        self.state = ReconnectState::Idle;
    }
}
