//! Timed color betting rounds.
//!
//! A round opens for bets, waits for a reveal, then cools down before the
//! next one starts. The round lives on the viewer's own chain; whoever sees
//! a phase overrun first pushes it forward.

use crate::error::{GameError, Result};
use pulse_core::round::{Round, RoundPhase, RoundProgram, RoundState, Viewer};
use pulse_core::{Amount, ChainId, Field, Request, RoundSynchronizer, Timestamp, TransitionOutcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

pub const BETTING_DURATION: Duration = Duration::from_secs(40);
/// Revealing and cooldown share one window.
pub const SETTLE_DURATION: Duration = Duration::from_secs(50);
pub const POLL_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    #[serde(rename = "COLOR_A", alias = "ColorA")]
    A,
    #[serde(rename = "COLOR_B", alias = "ColorB")]
    B,
    #[serde(rename = "COLOR_C", alias = "ColorC")]
    C,
    #[serde(rename = "COLOR_D", alias = "ColorD")]
    D,
    #[serde(rename = "COLOR_E", alias = "ColorE")]
    E,
}

impl Color {
    pub const ALL: [Color; 5] = [Color::A, Color::B, Color::C, Color::D, Color::E];

    /// Name the application expects as an enum argument.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Color::A => "COLOR_A",
            Color::B => "COLOR_B",
            Color::C => "COLOR_C",
            Color::D => "COLOR_D",
            Color::E => "COLOR_E",
        }
    }

    /// Advertised odds, scaled by 100.
    pub fn multiplier(&self) -> u64 {
        match self {
            Color::A | Color::B => 300,
            Color::C | Color::D => 600,
            Color::E => 900,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Color::A => "A",
            Color::B => "B",
            Color::C => "C",
            Color::D => "D",
            Color::E => "E",
        };
        write!(f, "Color {}", letter)
    }
}

impl std::str::FromStr for Color {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase();
        let letter = normalized
            .strip_prefix("COLOR_")
            .or_else(|| normalized.strip_prefix("COLOR"))
            .unwrap_or(&normalized);
        match letter {
            "A" => Ok(Color::A),
            "B" => Ok(Color::B),
            "C" => Ok(Color::C),
            "D" => Ok(Color::D),
            "E" => Ok(Color::E),
            _ => Err(GameError::InvalidBet(format!("unknown color {:?}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColorPhase {
    #[serde(alias = "Betting")]
    Betting,
    #[serde(alias = "Revealing")]
    Revealing,
    #[serde(alias = "Cooldown")]
    Cooldown,
}

impl RoundPhase for ColorPhase {
    fn nominal_duration(&self) -> Option<Duration> {
        match self {
            ColorPhase::Betting => Some(BETTING_DURATION),
            ColorPhase::Revealing | ColorPhase::Cooldown => Some(SETTLE_DURATION),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetData {
    pub owner: String,
    pub amount: Amount,
    pub color: Color,
    pub round_id: u64,
}

impl BetData {
    pub fn placed_by(&self, viewer: &Viewer) -> bool {
        self.owner.eq_ignore_ascii_case(viewer.owner.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColorRoundData {
    pub winning_color: Option<Color>,
    pub bets: Vec<BetData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastWin {
    pub amount: Amount,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColorPresentation {
    pub last_win: Option<LastWin>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRound {
    round_id: u64,
    start_time: Value,
    state: ColorPhase,
    winning_color: Option<Color>,
    #[serde(default)]
    bets: Vec<BetData>,
}

/// The color trading application.
#[derive(Debug, Clone, Default)]
pub struct ColorTrading;

impl ColorTrading {
    pub fn bet_request(amount: u64, color: Color) -> Request {
        Request::mutation(
            Field::new("bet")
                .arg("amount", amount)
                .arg("color", pulse_core::ledger::Arg::Enum(color.wire_name().to_string())),
        )
    }

    pub fn reveal_request() -> Request {
        Request::mutation(Field::new("reveal"))
    }

    pub fn start_round_request() -> Request {
        Request::mutation(Field::new("startRound"))
    }
}

impl RoundProgram for ColorTrading {
    type Phase = ColorPhase;
    type Payload = ColorRoundData;
    type Presentation = ColorPresentation;

    fn name(&self) -> &str {
        "color-trading"
    }

    fn poll_interval(&self) -> Duration {
        POLL_INTERVAL
    }

    fn state_query(&self) -> Request {
        Request::query(
            Field::new("activeRound")
                .select(&["roundId", "startTime", "state", "winningColor"])
                .with(Field::new("bets").select(&["owner", "amount", "color", "roundId"])),
        )
    }

    fn decode(&self, data: &Value, viewer: &ChainId) -> pulse_core::Result<Option<Round<Self>>> {
        let raw = match data.get("activeRound") {
            None | Some(Value::Null) => return Ok(None),
            Some(raw) => raw,
        };
        let raw: RawRound = serde_json::from_value(raw.clone()).map_err(GameError::from)?;

        Ok(Some(RoundState {
            round_id: raw.round_id,
            phase: raw.state,
            start_time: Timestamp::parse(&raw.start_time)?,
            authority_chain_id: viewer.clone(),
            payload: ColorRoundData {
                winning_color: raw.winning_color,
                bets: raw.bets,
            },
        }))
    }

    fn transition(&self, state: &Round<Self>) -> Option<Request> {
        match state.phase {
            ColorPhase::Betting => Some(Self::reveal_request()),
            ColorPhase::Revealing | ColorPhase::Cooldown => Some(Self::start_round_request()),
        }
    }

    fn present(
        &self,
        state: Option<&Round<Self>>,
        previous: &ColorPresentation,
        viewer: &Viewer,
    ) -> ColorPresentation {
        let state = match state {
            Some(state) => state,
            None => return previous.clone(),
        };

        match state.payload.winning_color {
            Some(color) => {
                let winnings = state
                    .payload
                    .bets
                    .iter()
                    .filter(|b| b.color == color && b.placed_by(viewer))
                    .fold(None, |sum: Option<Amount>, b| {
                        Some(sum.unwrap_or(Amount::ZERO).saturating_add(b.amount))
                    });

                match winnings {
                    Some(amount) if state.phase != ColorPhase::Betting => ColorPresentation {
                        last_win: Some(LastWin { amount, color }),
                    },
                    _ => previous.clone(),
                }
            }
            None if state.phase == ColorPhase::Betting => ColorPresentation::default(),
            None => previous.clone(),
        }
    }
}

/// Places a bet as the viewer's automation signer.
pub async fn place_bet(
    sync: &RoundSynchronizer<ColorTrading>,
    amount: u64,
    color: Color,
) -> Result<()> {
    if amount == 0 {
        return Err(GameError::InvalidBet("amount must be greater than 0".to_string()));
    }

    let view = sync.view();
    let round = view.state.as_ref().ok_or(GameError::NoActiveRound)?;
    if round.phase != ColorPhase::Betting {
        return Err(GameError::BettingClosed);
    }

    sync.submit(&ColorTrading::bet_request(amount, color)).await?;
    tracing::info!("Bet {} on {} in round {}", amount, color, round.round_id);
    Ok(())
}

/// Starts a round by hand. Goes through the same guard as the automatic
/// transitions.
pub async fn start_round(sync: &RoundSynchronizer<ColorTrading>) -> TransitionOutcome {
    sync.transition(&ColorTrading::start_round_request()).await
}
