use serde::{Deserialize, Serialize};

use crate::store::{GameId, GameRecord};

// ---------------------------------------------------------------------------
// Request models
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    #[serde(default)]
    pub game_name: String,
}

/// Seat request. Both fields are optional on the wire so a missing one
/// surfaces as a bad request rather than a deserialization failure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGameRequest {
    pub player_color: Option<String>,
    #[serde(rename = "gameID")]
    pub game_id: Option<GameId>,
}

// ---------------------------------------------------------------------------
// Response models
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub username: String,
    pub auth_token: String,
}

#[derive(Debug, Serialize)]
pub struct CreateGameResponse {
    #[serde(rename = "gameID")]
    pub game_id: GameId,
}

#[derive(Debug, Serialize)]
pub struct ListGamesResponse {
    pub games: Vec<GameRecord>,
}

#[derive(Debug, Serialize)]
pub struct EmptyResponse {}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime: u64,
}
