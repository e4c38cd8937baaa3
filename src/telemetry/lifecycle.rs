//! Relay connection lifecycle, independent of the robot link.
//!
//! ```text
//! Idle -> Connecting -> Open -> (Closed | Failed) -> PendingRetry -> Connecting
//!   any state --shutdown()--> Disabled (terminal)
//! ```

use std::time::Duration;

/// Default delay before reopening the relay socket
pub const DEFAULT_RELAY_RETRY_DELAY: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    Connecting,
    Open,
    PendingRetry,
    Disabled,
}

/// Relay state machine with a single pending retry
#[derive(Debug)]
pub struct RelayLifecycle {
    state: RelayState,
    retry_delay: Duration,
}

impl Default for RelayLifecycle {
    fn default() -> Self {
        Self::new(DEFAULT_RELAY_RETRY_DELAY)
    }
}

impl RelayLifecycle {
    pub fn new(retry_delay: Duration) -> Self {
        Self {
            state: RelayState::Idle,
            retry_delay,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state != RelayState::Disabled
    }

    pub fn is_open(&self) -> bool {
        self.state == RelayState::Open
    }

    /// Start a connection attempt
    ///
    /// Returns `false` when disabled or when a socket is already open or
    /// connecting.
    pub fn begin_connect(&mut self) -> bool {
        match self.state {
            RelayState::Idle | RelayState::PendingRetry => {
                self.state = RelayState::Connecting;
                true
            }
            RelayState::Connecting | RelayState::Open | RelayState::Disabled => false,
        }
    }

    /// The socket finished its handshake
    pub fn opened(&mut self) {
        if self.state == RelayState::Connecting {
            self.state = RelayState::Open;
        }
    }

    /// The socket closed, failed to open, or a send could not be queued
    ///
    /// Returns the delay of the retry to schedule, or `None` if the relay is
    /// disabled or a retry is already pending.
    pub fn fail(&mut self) -> Option<Duration> {
        match self.state {
            RelayState::Disabled | RelayState::PendingRetry => None,
            _ => {
                self.state = RelayState::PendingRetry;
                Some(self.retry_delay)
            }
        }
    }

    /// Deliberate shutdown; no retry happens afterwards
    pub fn shutdown(&mut self) {
        self.state = RelayState::Disabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut lifecycle = RelayLifecycle::default();
        assert_eq!(lifecycle.state(), RelayState::Idle);

        assert!(lifecycle.begin_connect());
        assert!(!lifecycle.begin_connect());
        lifecycle.opened();
        assert!(lifecycle.is_open());
    }

    #[test]
    fn test_send_failure_schedules_one_retry() {
        let mut lifecycle = RelayLifecycle::default();
        lifecycle.begin_connect();
        lifecycle.opened();

        assert_eq!(lifecycle.fail(), Some(Duration::from_millis(3000)));
        assert_eq!(lifecycle.fail(), None);
        assert_eq!(lifecycle.state(), RelayState::PendingRetry);

        assert!(lifecycle.begin_connect());
        assert_eq!(lifecycle.state(), RelayState::Connecting);
    }

    #[test]
    fn test_connect_failure_schedules_retry() {
        let mut lifecycle = RelayLifecycle::new(Duration::from_millis(10));
        lifecycle.begin_connect();
        assert_eq!(lifecycle.fail(), Some(Duration::from_millis(10)));
    }

    #[test]
    fn test_shutdown_prevents_any_retry() {
        let mut lifecycle = RelayLifecycle::default();
        lifecycle.begin_connect();
        lifecycle.opened();
        lifecycle.shutdown();

        assert!(!lifecycle.is_enabled());
        assert_eq!(lifecycle.fail(), None);
        assert_eq!(lifecycle.fail(), None);
        assert!(!lifecycle.begin_connect());
        lifecycle.opened();
        assert_eq!(lifecycle.state(), RelayState::Disabled);
    }

    #[test]
    fn test_shutdown_while_retry_pending() {
        let mut lifecycle = RelayLifecycle::default();
        lifecycle.begin_connect();
        lifecycle.fail();
        lifecycle.shutdown();

        assert!(!lifecycle.begin_connect());
    }
}
