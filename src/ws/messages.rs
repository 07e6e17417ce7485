//! Wire types for the live game protocol.
//!
//! Clients send [`UserGameCommand`]s tagged by `commandType`; the server
//! answers with [`ServerMessage`]s tagged by `serverMessageType`.

use serde::{Deserialize, Serialize};

use crate::engine::{Color, Game, Move};
use crate::store::GameId;

// ---------------------------------------------------------------------------
// Server → Client messages
// ---------------------------------------------------------------------------

/// Envelope for everything the server pushes to a connection.
#[derive(Debug, Clone, Serialize)]
pub struct ServerMessage {
    #[serde(rename = "serverMessageType")]
    pub message_type: ServerMessageType,
    #[serde(flatten)]
    pub payload: ServerPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessageType {
    LoadGame,
    Notification,
    Error,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ServerPayload {
    LoadGame(LoadGamePayload),
    Notification(NotificationPayload),
    Error(ErrorPayload),
}

/// Full game snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct LoadGamePayload {
    pub game: Game,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationPayload {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub error_message: String,
}

impl ServerMessage {
    pub fn load_game(game: &Game) -> Self {
        ServerMessage {
            message_type: ServerMessageType::LoadGame,
            payload: ServerPayload::LoadGame(LoadGamePayload { game: game.clone() }),
        }
    }

    pub fn notification(message: impl Into<String>) -> Self {
        ServerMessage {
            message_type: ServerMessageType::Notification,
            payload: ServerPayload::Notification(NotificationPayload {
                message: message.into(),
            }),
        }
    }

    /// Error for the originating connection. The text is prefixed with
    /// `Error: ` so clients can display it verbatim.
    pub fn error(reason: impl std::fmt::Display) -> Self {
        ServerMessage {
            message_type: ServerMessageType::Error,
            payload: ServerPayload::Error(ErrorPayload {
                error_message: format!("Error: {reason}"),
            }),
        }
    }

    /// Serialize to JSON text for sending over WebSocket.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"serverMessageType":"ERROR","errorMessage":"Error: serialization failed"}"#
                .to_string()
        })
    }
}

// ---------------------------------------------------------------------------
// Client → Server commands
// ---------------------------------------------------------------------------

/// Commands a client sends over its socket. Every command carries the
/// caller's auth token and the game it targets.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "commandType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserGameCommand {
    /// Attach to a game, seated as `player_color` or as an observer.
    Connect {
        #[serde(rename = "authToken")]
        auth_token: String,
        #[serde(rename = "gameID")]
        game_id: GameId,
        #[serde(rename = "playerColor", default)]
        player_color: Option<Color>,
    },
    MakeMove {
        #[serde(rename = "authToken")]
        auth_token: String,
        #[serde(rename = "gameID")]
        game_id: GameId,
        #[serde(rename = "move")]
        mv: Move,
    },
    Leave {
        #[serde(rename = "authToken")]
        auth_token: String,
        #[serde(rename = "gameID")]
        game_id: GameId,
    },
    Resign {
        #[serde(rename = "authToken")]
        auth_token: String,
        #[serde(rename = "gameID")]
        game_id: GameId,
    },
}

impl UserGameCommand {
    pub fn auth_token(&self) -> &str {
        match self {
            UserGameCommand::Connect { auth_token, .. }
            | UserGameCommand::MakeMove { auth_token, .. }
            | UserGameCommand::Leave { auth_token, .. }
            | UserGameCommand::Resign { auth_token, .. } => auth_token,
        }
    }

    pub fn game_id(&self) -> GameId {
        match self {
            UserGameCommand::Connect { game_id, .. }
            | UserGameCommand::MakeMove { game_id, .. }
            | UserGameCommand::Leave { game_id, .. }
            | UserGameCommand::Resign { game_id, .. } => *game_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
