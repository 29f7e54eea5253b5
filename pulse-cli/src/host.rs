use pulse_core::{SessionHost, SessionNotice};
use std::sync::atomic::{AtomicBool, Ordering};

/// A terminal process cannot reload itself; a reset is reported once the
/// command finishes and the next run starts clean.
#[derive(Debug, Default)]
pub struct CliHost {
    reload_requested: AtomicBool,
}

impl CliHost {
    pub fn reload_requested(&self) -> bool {
        self.reload_requested.load(Ordering::SeqCst)
    }
}

impl SessionHost for CliHost {
    fn notify(&self, notice: SessionNotice) {
        tracing::warn!("{}", notice);
        eprintln!("{}", notice);
    }

    fn reload(&self) {
        self.reload_requested.store(true, Ordering::SeqCst);
    }
}
