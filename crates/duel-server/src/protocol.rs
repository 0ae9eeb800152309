//! JSON wire format. Every frame in either direction is
//! `{"event": <name>, "data": <payload>}`.

use duel_core::session::{GameOver, GameStart, Role, RoundResult, RoundStart, SessionSnapshot};
use duel_core::{Choice, RoomCode};
use serde::{Deserialize, Serialize};

/// Raw inbound frame before the payload is decoded for its event.
#[derive(Debug, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoom {
    pub player_name: String,
    pub total_rounds: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoom {
    pub room_code: RoomCode,
    pub player_name: String,
    #[serde(default)]
    pub is_spectator: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerChoice {
    pub room_code: RoomCode,
    pub choice: Choice,
}

/// Payload of events that only name a room.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRef {
    pub room_code: RoomCode,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomAck {
    pub room_code: RoomCode,
    pub player_role: Role,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerNamed {
    pub player_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomNamed {
    pub room_code: RoomCode,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Everything the server sends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    RoomCreated(RoomAck),
    RoomJoined(RoomAck),
    GameState(SessionSnapshot),
    RoomError(ErrorBody),
    Error(ErrorBody),
    PlayerJoined(PlayerNamed),
    GameStart(GameStart),
    RoundResult(RoundResult),
    NewRound(RoundStart),
    GameOver(GameOver),
    PlayerLeft(PlayerNamed),
    LeftRoom(RoomNamed),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoomCreated(_) => "roomCreated",
            Self::RoomJoined(_) => "roomJoined",
            Self::GameState(_) => "gameState",
            Self::RoomError(_) => "roomError",
            Self::Error(_) => "error",
            Self::PlayerJoined(_) => "playerJoined",
            Self::GameStart(_) => "gameStart",
            Self::RoundResult(_) => "roundResult",
            Self::NewRound(_) => "newRound",
            Self::GameOver(_) => "gameOver",
            Self::PlayerLeft(_) => "playerLeft",
            Self::LeftRoom(_) => "leftRoom",
        }
    }

    pub fn room_error(code: &str, message: impl Into<String>) -> Self {
        Self::RoomError(ErrorBody {
            code: code.to_string(),
            message: message.into(),
        })
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error(ErrorBody {
            code: code.to_string(),
            message: message.into(),
        })
    }
}

/// Frame-level failures, reported to the sender as an `error` event.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    #[error("invalid {event} payload: {reason}")]
    InvalidPayload { event: String, reason: String },
}

impl ProtocolError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse(_) => "PARSE_ERROR",
            Self::UnknownEvent(_) => "UNKNOWN_EVENT",
            Self::InvalidPayload { .. } => "INVALID_PAYLOAD",
        }
    }

    pub fn invalid(event: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            event: event.to_string(),
            reason: reason.into(),
        }
    }
}

pub fn parse_frame(raw: &str) -> Result<ClientFrame, ProtocolError> {
    serde_json::from_str(raw).map_err(ProtocolError::Parse)
}

/// Decode the payload of `event`.
pub fn decode<T: serde::de::DeserializeOwned>(event: &str, data: serde_json::Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|e| ProtocolError::invalid(event, e.to_string()))
}
