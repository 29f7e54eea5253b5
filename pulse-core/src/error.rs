use thiserror::Error;

pub type Result<T> = std::result::Result<T, PulseError>;

/// Error messages the ledger client produces when its local replica is
/// corrupted beyond repair. Seeing one of these means the only way forward
/// is a full local reset.
pub const FATAL_SYNC_SIGNATURES: &[&str] = &[
    "out of order",
    "Blob not found",
    "Worker operation failed",
    "Missing dependency",
];

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Missing runtime capability: {0}")]
    MissingRuntimeCapability(String),

    #[error("Restore failed: {0}")]
    RestoreFailed(String),

    #[error("Fatal sync corruption ({signature}): {message}")]
    FatalSyncCorruption { signature: String, message: String },

    #[error("Network error: {0}")]
    TransientNetwork(String),

    #[error("Automation signer registration failed: {0}")]
    AutomationRegistration(String),

    #[error("Transition mutation failed: {0}")]
    GuardedMutation(String),

    #[error("No signer for address {address}")]
    SignerRouting { address: String },

    #[error("Signing rejected: {0}")]
    SignerRejected(String),

    #[error("Session not connected")]
    NotConnected,

    #[error("Connection already in progress")]
    ConnectInProgress,

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PulseError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn ledger(msg: impl Into<String>) -> Self {
        Self::Ledger(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::TransientNetwork(msg.into())
    }

    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::Crypto(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::SignerRejected(msg.into())
    }

    /// Returns the fatal signature this error's message carries, if any.
    pub fn fatal_signature(&self) -> Option<&'static str> {
        let message = self.to_string();
        FATAL_SYNC_SIGNATURES
            .iter()
            .copied()
            .find(|s| message.contains(s))
    }

    /// Reclassifies an error as `FatalSyncCorruption` when it matches one
    /// of the known signatures, otherwise returns it unchanged.
    pub fn into_fatal_if_corrupt(self) -> Self {
        match self {
            Self::FatalSyncCorruption { .. } => self,
            other => match other.fatal_signature() {
                Some(signature) => Self::FatalSyncCorruption {
                    signature: signature.to_string(),
                    message: other.to_string(),
                },
                None => other,
            },
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal_signature().is_some()
    }
}
