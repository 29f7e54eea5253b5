//! Multi-chain bingo rooms.
//!
//! The room lives on the host's chain. Guests keep a local copy that names
//! the host and read the authoritative room from there; turns advance on
//! player picks, so no phase here has a deadline.

use crate::error::{GameError, Result};
use pulse_core::round::{Round, RoundPhase, RoundProgram, RoundState, Viewer};
use pulse_core::{ChainId, Field, Request, RoundSynchronizer, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const BOARD_SIZE: usize = 25;
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_NAME_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    #[serde(alias = "WaitingForPlayers")]
    WaitingForPlayers,
    #[serde(alias = "Playing")]
    Playing,
    #[serde(alias = "Ended")]
    Ended,
}

impl RoundPhase for GameState {
    fn nominal_duration(&self) -> Option<Duration> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerStatus {
    #[serde(alias = "Active")]
    Active,
    #[serde(alias = "Left")]
    Left,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub chain_id: ChainId,
    pub name: String,
    pub board: Vec<u32>,
    pub marked: Vec<bool>,
    pub is_winner: bool,
    pub status: PlayerStatus,
}

impl Player {
    pub fn marked_count(&self) -> usize {
        self.marked.iter().filter(|m| **m).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRoom {
    pub room_id: String,
    pub host_chain_id: ChainId,
    pub players: Vec<Player>,
    pub game_state: GameState,
    pub called_numbers: Vec<u32>,
    pub current_turn_index: Option<usize>,
    pub winner_name: Option<String>,
    pub pot_amount: u64,
}

impl GameRoom {
    pub fn player(&self, chain_id: &ChainId) -> Option<&Player> {
        self.players.iter().find(|p| &p.chain_id == chain_id)
    }

    pub fn current_player(&self) -> Option<&Player> {
        self.current_turn_index.and_then(|i| self.players.get(i))
    }

    pub fn is_called(&self, number: u32) -> bool {
        self.called_numbers.contains(&number)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BingoPresentation {
    pub is_host: bool,
    pub my_turn: bool,
    pub winner: Option<String>,
    pub active_players: usize,
}

/// The bingo application.
#[derive(Debug, Clone, Default)]
pub struct Bingo;

impl Bingo {
    pub fn create_game_request(player_name: &str) -> Result<Request> {
        let name = validate_name(player_name)?;
        Ok(Request::mutation(
            Field::new("createGame").arg("playerName", name),
        ))
    }

    pub fn join_game_request(host_chain_id: &ChainId, player_name: &str) -> Result<Request> {
        let name = validate_name(player_name)?;
        Ok(Request::mutation(
            Field::new("joinGame")
                .arg("hostChainId", host_chain_id.as_str())
                .arg("playerName", name),
        ))
    }

    pub fn pick_number_request(number: u32) -> Result<Request> {
        if number == 0 || number as usize > BOARD_SIZE {
            return Err(GameError::InvalidNumber(number));
        }
        Ok(Request::mutation(Field::new("pickNumber").arg("number", number)))
    }

    pub fn leave_game_request() -> Request {
        Request::mutation(Field::new("leaveGame"))
    }

    pub fn hard_reset_request() -> Request {
        Request::mutation(Field::new("hardReset"))
    }
}

fn validate_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GameError::InvalidName("name cannot be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(GameError::InvalidName(format!(
            "name longer than {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name)
}

impl RoundProgram for Bingo {
    type Phase = GameState;
    type Payload = GameRoom;
    type Presentation = BingoPresentation;

    fn name(&self) -> &str {
        "bingo"
    }

    fn poll_interval(&self) -> Duration {
        POLL_INTERVAL
    }

    fn state_query(&self) -> Request {
        Request::query(
            Field::new("room")
                .select(&["roomId", "hostChainId"])
                .with(Field::new("players").select(&[
                    "chainId",
                    "name",
                    "board",
                    "marked",
                    "isWinner",
                    "status",
                ]))
                .select(&[
                    "gameState",
                    "calledNumbers",
                    "currentTurnIndex",
                    "winnerName",
                    "potAmount",
                ]),
        )
    }

    fn decode(&self, data: &Value, viewer: &ChainId) -> pulse_core::Result<Option<Round<Self>>> {
        let raw = match data.get("room") {
            None | Some(Value::Null) => return Ok(None),
            Some(raw) => raw,
        };
        let room: GameRoom = serde_json::from_value(raw.clone()).map_err(GameError::from)?;

        let authority = if room.host_chain_id.as_str().is_empty() {
            viewer.clone()
        } else {
            room.host_chain_id.clone()
        };

        Ok(Some(RoundState {
            round_id: room.room_id.parse().unwrap_or(0),
            phase: room.game_state,
            // Rooms are untimed.
            start_time: Timestamp::default(),
            authority_chain_id: authority,
            payload: room,
        }))
    }

    fn transition(&self, _state: &Round<Self>) -> Option<Request> {
        None
    }

    fn present(
        &self,
        state: Option<&Round<Self>>,
        _previous: &BingoPresentation,
        viewer: &Viewer,
    ) -> BingoPresentation {
        let room = match state {
            Some(state) => &state.payload,
            None => return BingoPresentation::default(),
        };

        let my_turn = room.game_state == GameState::Playing
            && room
                .current_player()
                .map_or(false, |p| p.chain_id == viewer.chain_id);

        BingoPresentation {
            is_host: room.host_chain_id == viewer.chain_id,
            my_turn,
            winner: room.winner_name.clone(),
            active_players: room
                .players
                .iter()
                .filter(|p| p.status == PlayerStatus::Active)
                .count(),
        }
    }
}

pub async fn create_game(sync: &RoundSynchronizer<Bingo>, player_name: &str) -> Result<()> {
    sync.submit(&Bingo::create_game_request(player_name)?).await?;
    tracing::info!("Created bingo room as {}", player_name.trim());
    Ok(())
}

pub async fn join_game(
    sync: &RoundSynchronizer<Bingo>,
    host_chain_id: &ChainId,
    player_name: &str,
) -> Result<()> {
    sync.submit(&Bingo::join_game_request(host_chain_id, player_name)?)
        .await?;
    tracing::info!("Joined bingo room hosted on {}", host_chain_id);
    Ok(())
}

/// Calls a number on the viewer's turn.
pub async fn pick_number(sync: &RoundSynchronizer<Bingo>, number: u32) -> Result<()> {
    let request = Bingo::pick_number_request(number)?;

    let view = sync.view();
    let room = &view.state.as_ref().ok_or(GameError::NotInRoom)?.payload;
    if room.game_state != GameState::Playing {
        return Err(GameError::InvalidState(format!(
            "room is {:?}, not playing",
            room.game_state
        )));
    }
    if !view.presentation.my_turn {
        return Err(GameError::NotYourTurn);
    }
    if room.is_called(number) {
        return Err(GameError::AlreadyCalled(number));
    }

    sync.submit(&request).await?;
    Ok(())
}

/// Leaves the room and forgets it locally.
pub async fn leave_game(sync: &RoundSynchronizer<Bingo>) -> Result<()> {
    sync.invalidate();
    sync.submit(&Bingo::leave_game_request()).await?;
    tracing::info!("Left bingo room");
    Ok(())
}

/// Drops whatever room state the viewer's chain holds.
pub async fn hard_reset(sync: &RoundSynchronizer<Bingo>) -> Result<()> {
    sync.invalidate();
    sync.submit(&Bingo::hard_reset_request()).await?;
    tracing::warn!("Bingo state hard reset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::Address;
    use serde_json::json;

    fn viewer(chain: &str) -> Viewer {
        Viewer {
            chain_id: ChainId::new(chain),
            owner: Address::parse("0x2222222222222222222222222222222222222222").unwrap(),
        }
    }

    fn room(state: &str, turn: Option<usize>) -> Value {
        json!({
            "room": {
                "roomId": "1700000000",
                "hostChainId": "host-chain",
                "players": [
                    {
                        "chainId": "host-chain",
                        "name": "alice",
                        "board": (1..=25).collect::<Vec<u32>>(),
                        "marked": vec![false; 25],
                        "isWinner": false,
                        "status": "ACTIVE",
                    },
                    {
                        "chainId": "guest-chain",
                        "name": "bob",
                        "board": (1..=25).rev().collect::<Vec<u32>>(),
                        "marked": vec![false; 25],
                        "isWinner": false,
                        "status": "Left",
                    },
                ],
                "gameState": state,
                "calledNumbers": [4, 9],
                "currentTurnIndex": turn,
                "winnerName": null,
                "potAmount": 0,
            }
        })
    }

    #[test]
    fn test_guest_room_names_host_as_authority() {
        let round = Bingo
            .decode(&room("PLAYING", Some(1)), &ChainId::new("guest-chain"))
            .unwrap()
            .unwrap();

        assert_eq!(round.authority_chain_id, ChainId::new("host-chain"));
        assert_eq!(round.round_id, 1_700_000_000);
        assert_eq!(round.phase, GameState::Playing);
        assert_eq!(round.payload.players[1].status, PlayerStatus::Left);
        assert!(round.payload.is_called(9));
        assert!(Bingo.transition(&round).is_none());
        assert!(!round.is_overdue(Timestamp::from_micros(u64::MAX), Duration::ZERO));
    }

    #[test]
    fn test_no_room() {
        let decoded = Bingo
            .decode(&json!({"room": null}), &ChainId::new("guest-chain"))
            .unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn test_presentation_follows_turn() {
        let data = room("PLAYING", Some(1));
        let guest = viewer("guest-chain");
        let round = Bingo.decode(&data, &guest.chain_id).unwrap().unwrap();

        let shown = Bingo.present(Some(&round), &BingoPresentation::default(), &guest);
        assert!(shown.my_turn);
        assert!(!shown.is_host);
        assert_eq!(shown.active_players, 1);

        let host = viewer("host-chain");
        let shown = Bingo.present(Some(&round), &BingoPresentation::default(), &host);
        assert!(!shown.my_turn);
        assert!(shown.is_host);

        let waiting = Bingo
            .decode(&room("WaitingForPlayers", Some(1)), &guest.chain_id)
            .unwrap()
            .unwrap();
        assert!(!Bingo.present(Some(&waiting), &shown, &guest).my_turn);
    }

    #[test]
    fn test_requests() {
        assert_eq!(
            Bingo::create_game_request("  alice ").unwrap().render(),
            "mutation { createGame(playerName: \"alice\") }"
        );
        assert_eq!(
            Bingo::join_game_request(&ChainId::new("host-chain"), "bob \"the\" builder")
                .unwrap()
                .render(),
            "mutation { joinGame(hostChainId: \"host-chain\", playerName: \"bob \\\"the\\\" builder\") }"
        );
        assert!(Bingo::create_game_request("   ").is_err());
        assert!(matches!(
            Bingo::pick_number_request(26),
            Err(GameError::InvalidNumber(26))
        ));
        assert_eq!(Bingo::leave_game_request().render(), "mutation { leaveGame }");
    }
}
