//! Round programs for the Pulse SDK
//!
//! Each game describes how to read its round from the ledger, which
//! mutation pushes an overdue phase forward and what to show the viewer.
//! Reconciliation itself lives in `pulse_core::round`.

pub mod bingo;
pub mod color_trading;
pub mod error;

pub use bingo::{Bingo, BingoPresentation, GameRoom, GameState, Player, PlayerStatus};
pub use color_trading::{BetData, Color, ColorPhase, ColorPresentation, ColorTrading, LastWin};
pub use error::{GameError, Result};

use pulse_core::round::RoundProgram;
use pulse_core::{ApplicationId, RoundSynchronizer, SessionManager, SystemClock};
use std::sync::Arc;

/// Synchronizer for `program` on the session's chain, acting as the
/// session's automation signer.
pub fn synchronizer<G: RoundProgram>(
    session: &SessionManager,
    application_id: &ApplicationId,
    program: G,
) -> Result<Arc<RoundSynchronizer<G>>> {
    let app = session.application(application_id)?;
    let config = session.config();

    tracing::info!(
        "Following {} application {} on chain {}",
        program.name(),
        application_id,
        app.chain_id()
    );

    Ok(Arc::new(RoundSynchronizer::new(
        Arc::new(program),
        app,
        Arc::new(SystemClock),
        config.transition_cooldown,
        config.deadline_grace,
    )))
}
