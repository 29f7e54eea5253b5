use crate::types::{Address, Amount, ChainId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Uninitialized,
    Disconnected,
    Connecting,
    /// Restored from storage, waiting for the first balance read.
    Syncing,
    Connected,
    Ready,
    Resetting,
}

impl SessionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            SessionStatus::Syncing | SessionStatus::Connected | SessionStatus::Ready
        )
    }
}

/// Read-only view of the session handed to consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub chain_id: Option<ChainId>,
    pub primary_address: Option<Address>,
    pub automation_address: Option<Address>,
    pub balance: Option<Amount>,
    pub is_connecting: bool,
    pub automation_registered: bool,
    pub error: Option<String>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            status: SessionStatus::Uninitialized,
            chain_id: None,
            primary_address: None,
            automation_address: None,
            balance: None,
            is_connecting: false,
            automation_registered: false,
            error: None,
        }
    }
}

impl SessionSnapshot {
    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }

    /// Clears the identity fields, keeping the error message.
    pub(crate) fn clear_identity(&mut self, status: SessionStatus) {
        self.status = status;
        self.chain_id = None;
        self.primary_address = None;
        self.automation_address = None;
        self.balance = None;
        self.automation_registered = false;
    }
}

/// Messages the session publishes for the user to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    Resetting { reason: String },
}

impl std::fmt::Display for SessionNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionNotice::Resetting { reason } => {
                write!(f, "Critical sync error detected ({}). Resetting network...", reason)
            }
        }
    }
}
