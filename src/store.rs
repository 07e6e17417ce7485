//! Collaborators the session layer depends on: token authentication and game
//! persistence.
//!
//! Both are traits so the service can be built against any backing store.
//! The in-memory implementations here are what the server runs with and what
//! the tests use.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::engine::{Color, Game};

/// Identifier of a stored game.
pub type GameId = u32;

// ---------------------------------------------------------------------------
// Identity / authentication
// ---------------------------------------------------------------------------

/// An authenticated caller.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Identity {
    pub username: String,
}

impl Identity {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// Resolves auth tokens to identities.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, token: &str) -> Option<Identity>;
}

// ---------------------------------------------------------------------------
// Game records
// ---------------------------------------------------------------------------

/// A stored game: its seats and current state.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    #[serde(rename = "gameID")]
    pub game_id: GameId,
    #[serde(rename = "gameName")]
    pub name: String,
    pub white_username: Option<String>,
    pub black_username: Option<String>,
    #[serde(skip)]
    pub game: Game,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
}

impl GameRecord {
    /// Username holding the `color` seat.
    pub fn seat(&self, color: Color) -> Option<&str> {
        match color {
            Color::White => self.white_username.as_deref(),
            Color::Black => self.black_username.as_deref(),
        }
    }

    /// The colour `username` is seated as, if any. White wins a tie, which
    /// only happens when one user holds both seats.
    pub fn color_of(&self, username: &str) -> Option<Color> {
        if self.white_username.as_deref() == Some(username) {
            Some(Color::White)
        } else if self.black_username.as_deref() == Some(username) {
            Some(Color::Black)
        } else {
            None
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("game {0} not found")]
    NotFound(GameId),

    #[error("storage lock poisoned")]
    Poisoned,
}

/// Game persistence.
pub trait GameStore: Send + Sync {
    fn create_game_record(&self, name: &str) -> Result<GameId, StoreError>;

    fn get_game_record(&self, id: GameId) -> Result<Option<GameRecord>, StoreError>;

    fn update_seat(
        &self,
        id: GameId,
        color: Color,
        username: Option<String>,
    ) -> Result<(), StoreError>;

    fn update_board(&self, id: GameId, game: &Game) -> Result<(), StoreError>;

    fn list_game_records(&self) -> Result<Vec<GameRecord>, StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

/// Token table kept in memory.
#[derive(Debug, Default)]
pub struct MemoryAuth {
    tokens: RwLock<HashMap<String, Identity>>,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token for `username`.
    pub fn issue(&self, username: &str) -> Result<String, StoreError> {
        let token = Uuid::new_v4().to_string();
        self.insert(&token, username)?;
        Ok(token)
    }

    /// Register a known token.
    pub fn insert(&self, token: &str, username: &str) -> Result<(), StoreError> {
        let mut tokens = self.tokens.write().map_err(|_| StoreError::Poisoned)?;
        tokens.insert(token.to_string(), Identity::new(username));
        Ok(())
    }
}

impl Authenticator for MemoryAuth {
    fn authenticate(&self, token: &str) -> Option<Identity> {
        self.tokens.read().ok()?.get(token).cloned()
    }
}

/// Game records kept in memory, ids assigned sequentially from 1.
#[derive(Debug)]
pub struct MemoryGameStore {
    games: RwLock<HashMap<GameId, GameRecord>>,
    next_id: AtomicU32,
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self {
            games: RwLock::new(HashMap::new()),
            next_id: AtomicU32::new(1),
        }
    }
}

impl Default for MemoryGameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GameStore for MemoryGameStore {
    fn create_game_record(&self, name: &str) -> Result<GameId, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = GameRecord {
            game_id: id,
            name: name.to_string(),
            white_username: None,
            black_username: None,
            game: Game::new(),
            created_at: Utc::now(),
        };
        let mut games = self.games.write().map_err(|_| StoreError::Poisoned)?;
        games.insert(id, record);
        Ok(id)
    }

    fn get_game_record(&self, id: GameId) -> Result<Option<GameRecord>, StoreError> {
        let games = self.games.read().map_err(|_| StoreError::Poisoned)?;
        Ok(games.get(&id).cloned())
    }

    fn update_seat(
        &self,
        id: GameId,
        color: Color,
        username: Option<String>,
    ) -> Result<(), StoreError> {
        let mut games = self.games.write().map_err(|_| StoreError::Poisoned)?;
        let record = games.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        match color {
            Color::White => record.white_username = username,
            Color::Black => record.black_username = username,
        }
        Ok(())
    }

    fn update_board(&self, id: GameId, game: &Game) -> Result<(), StoreError> {
        let mut games = self.games.write().map_err(|_| StoreError::Poisoned)?;
        let record = games.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.game = game.clone();
        Ok(())
    }

    fn list_game_records(&self) -> Result<Vec<GameRecord>, StoreError> {
        let games = self.games.read().map_err(|_| StoreError::Poisoned)?;
        let mut records: Vec<GameRecord> = games.values().cloned().collect();
        records.sort_by_key(|r| r.game_id);
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
