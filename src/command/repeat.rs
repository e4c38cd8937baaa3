//! Auto-repeat registry: at most one pending repeat timer per control.

use std::collections::HashMap;
use tokio::task::JoinHandle;

/// Identity of one press of a control
///
/// Tick events carry the token of the press that started them; a tick whose
/// token is no longer current belongs to a released (or re-pressed) control
/// and must be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RepeatToken(u64);

#[derive(Debug)]
struct PendingRepeat {
    token: RepeatToken,
    timer: Option<JoinHandle<()>>,
}

impl PendingRepeat {
    fn cancel(self) {
        if let Some(timer) = self.timer {
            timer.abort();
        }
    }
}

/// Tracks the pending repeat of every held control
#[derive(Debug, Default)]
pub struct RepeatRegistry {
    next_token: u64,
    pending: HashMap<String, PendingRepeat>,
}

impl RepeatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new press, cancelling the previous repeat of `control`
    pub fn start(&mut self, control: &str) -> RepeatToken {
        self.cancel(control);

        self.next_token += 1;
        let token = RepeatToken(self.next_token);
        self.pending.insert(
            control.to_string(),
            PendingRepeat { token, timer: None },
        );
        token
    }

    /// Attach the timer task driving the repeat started with `token`
    ///
    /// If the press was already cancelled the timer is aborted right away.
    pub fn attach_timer(&mut self, control: &str, token: RepeatToken, timer: JoinHandle<()>) {
        match self.pending.get_mut(control) {
            Some(pending) if pending.token == token => {
                if let Some(old) = pending.timer.replace(timer) {
                    old.abort();
                }
            }
            _ => timer.abort(),
        }
    }

    /// Whether `token` is the live press of `control`
    pub fn is_current(&self, control: &str, token: RepeatToken) -> bool {
        self.pending
            .get(control)
            .map_or(false, |pending| pending.token == token)
    }

    /// Cancel the repeat of `control`; returns whether one was pending
    pub fn cancel(&mut self, control: &str) -> bool {
        match self.pending.remove(control) {
            Some(pending) => {
                pending.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every pending repeat
    pub fn cancel_all(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.cancel();
        }
    }

    /// Number of controls currently held
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Drop for RepeatRegistry {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
