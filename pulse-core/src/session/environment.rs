use crate::session::state::SessionNotice;
use std::time::Duration;

/// Preconditions the ledger client needs from the process it runs in.
pub trait RuntimeEnvironment: Send + Sync {
    fn check(&self) -> std::result::Result<(), String>;
}

/// Requires a running tokio runtime with its time driver: every ledger call
/// is a task on it and every refresher and poll loop runs on its timers.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioRuntime;

impl RuntimeEnvironment for TokioRuntime {
    fn check(&self) -> std::result::Result<(), String> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| format!("No tokio runtime available: {}", e))?;

        // Creating a timer panics when the runtime was built without one.
        let _guard = handle.enter();
        std::panic::catch_unwind(|| {
            let _ = tokio::time::sleep(Duration::ZERO);
        })
        .map_err(|_| "Tokio runtime has no time driver (enable_time)".to_string())
    }
}

/// The application hosting the session.
pub trait SessionHost: Send + Sync {
    fn notify(&self, notice: SessionNotice);

    /// Restarts the application from a clean slate.
    fn reload(&self);
}
