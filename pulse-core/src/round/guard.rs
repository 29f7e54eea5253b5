use crate::clock::Clock;
use crate::error::{PulseError, Result};
use crate::types::Timestamp;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Submitted,
    Failed(String),
    /// Another attempt from this instance is still cooling down.
    Suppressed,
}

#[derive(Debug, Default)]
struct GuardState {
    locked: bool,
    cooldown_until: Timestamp,
}

/// Lets at most one phase-transition mutation through per cooldown window.
///
/// The lock lapses when the cooldown has passed, whether the attempt
/// succeeded or not. Nothing is retried here: the next poll that still sees
/// an overdue phase will try again.
pub struct TransitionGuard {
    clock: Arc<dyn Clock>,
    cooldown: Duration,
    state: Mutex<GuardState>,
}

impl TransitionGuard {
    pub fn new(clock: Arc<dyn Clock>, cooldown: Duration) -> Self {
        Self {
            clock,
            cooldown,
            state: Mutex::new(GuardState::default()),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn is_locked(&self) -> bool {
        let state = self.state.lock();
        state.locked && self.clock.now() < state.cooldown_until
    }

    fn try_acquire(&self) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();

        if state.locked && now < state.cooldown_until {
            return false;
        }

        state.locked = true;
        state.cooldown_until = now.saturating_add(self.cooldown);
        true
    }

    pub async fn try_transition<F, Fut, T>(&self, label: &str, submit: F) -> TransitionOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.try_acquire() {
            tracing::debug!("Transition {} suppressed, cooldown active", label);
            return TransitionOutcome::Suppressed;
        }

        tracing::info!("Auto-triggering transition: {}", label);
        match submit().await {
            Ok(_) => TransitionOutcome::Submitted,
            Err(e) => {
                let err = PulseError::GuardedMutation(e.to_string());
                tracing::warn!("{}", err);
                TransitionOutcome::Failed(e.to_string())
            }
        }
    }
}
