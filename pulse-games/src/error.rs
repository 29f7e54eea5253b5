use thiserror::Error;

pub type Result<T> = std::result::Result<T, GameError>;

#[derive(Error, Debug)]
pub enum GameError {
    #[error("Pulse core error: {0}")]
    PulseCore(#[from] pulse_core::PulseError),

    #[error("Invalid game state: {0}")]
    InvalidState(String),

    #[error("Betting is closed")]
    BettingClosed,

    #[error("No active round")]
    NoActiveRound,

    #[error("Not in a game room")]
    NotInRoom,

    #[error("Not your turn")]
    NotYourTurn,

    #[error("Invalid bet: {0}")]
    InvalidBet(String),

    #[error("Invalid number {0}: must be between 1 and 25")]
    InvalidNumber(u32),

    #[error("Number {0} has already been called")]
    AlreadyCalled(u32),

    #[error("Invalid player name: {0}")]
    InvalidName(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GameError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

impl From<GameError> for pulse_core::PulseError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::PulseCore(inner) => inner,
            other => pulse_core::PulseError::ledger(other.to_string()),
        }
    }
}
