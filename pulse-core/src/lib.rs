//! Pulse SDK - Core library for chain identity and round-based sessions
//!
//! This library keeps a user's chain identity (an interactive primary signer
//! paired with a silent automation signer) alive across restarts, and keeps
//! local copies of remotely owned game rounds in step with their authority
//! chains.

pub mod clock;
pub mod error;
pub mod ledger;
pub mod round;
pub mod session;
pub mod signer;
pub mod storage;
pub mod task;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{PulseError, Result};
pub use ledger::{ApplicationHandle, Field, LedgerClient, Request};
pub use round::{
    RoundPhase, RoundProgram, RoundState, RoundSynchronizer, SyncHandle, SyncView,
    TransitionGuard, TransitionOutcome, Viewer,
};
pub use session::{
    SessionConfig, SessionHost, SessionManager, SessionNotice, SessionServices, SessionSnapshot,
    SessionStatus,
};
pub use signer::{CompositeSigner, LocalSigner, Signer};
pub use task::TaskHandle;
pub use types::{Address, Amount, ApplicationId, ChainId, Signature, Timestamp};
