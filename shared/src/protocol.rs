//! Message envelope and payloads exchanged over the wire.
//!
//! Every frame carries one [`Envelope`]: a `type` tag, a `data` payload whose
//! shape depends on the tag, and an optional server-stamped `timestamp`.

use crate::entity::{Player, Snapshot, Vector2};
use serde::{Deserialize, Serialize};

/// Tagged frame wrapper shared by both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<M> {
    #[serde(flatten)]
    pub message: M,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl<M> Envelope<M> {
    pub fn new(message: M) -> Self {
        Self {
            message,
            timestamp: None,
        }
    }

    pub fn stamped(message: M, timestamp: u64) -> Self {
        Self {
            message,
            timestamp: Some(timestamp),
        }
    }
}

/// Messages sent by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    JoinGame(JoinGamePayload),
    LeaveGame(LeaveGamePayload),
    PlayerInput(PlayerInputPayload),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct JoinGamePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LeaveGamePayload {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerAction {
    Attack,
}

/// One input sample; `direction` is the raw stick/keyboard vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInputPayload {
    pub direction: Vector2,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<PlayerAction>,
}

impl PlayerInputPayload {
    pub fn wants_attack(&self) -> bool {
        self.action == Some(PlayerAction::Attack)
    }
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    YouJoined(YouJoinedPayload),
    PlayerJoined(PlayerJoinedPayload),
    PlayerLeft(PlayerLeftPayload),
    PlayerDied(PlayerDiedPayload),
    GameStart(GameStartPayload),
    GameEnd(GameEndPayload),
    GameStateUpdate(GameStateUpdatePayload),
}

impl ServerMessage {
    /// Wire tag of the message, used for logging.
    pub fn tag(&self) -> &'static str {
        match self {
            ServerMessage::YouJoined(_) => "YOU_JOINED",
            ServerMessage::PlayerJoined(_) => "PLAYER_JOINED",
            ServerMessage::PlayerLeft(_) => "PLAYER_LEFT",
            ServerMessage::PlayerDied(_) => "PLAYER_DIED",
            ServerMessage::GameStart(_) => "GAME_START",
            ServerMessage::GameEnd(_) => "GAME_END",
            ServerMessage::GameStateUpdate(_) => "GAME_STATE_UPDATE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YouJoinedPayload {
    pub player_id: String,
    pub player: Player,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerJoinedPayload {
    pub player: Player,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLeftPayload {
    pub player_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDiedPayload {
    pub player_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStartPayload {
    pub game_state: Snapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalScore {
    pub player_id: String,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEndPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    pub final_scores: Vec<FinalScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateUpdatePayload {
    pub game_state: Snapshot,
    pub timestamp: u64,
}
