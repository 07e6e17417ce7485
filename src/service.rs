//! Game session service: authorization-gated orchestration of one [`Game`]
//! per stored game on behalf of remote participants.
//!
//! Every mutation of a game (join, move, resign) runs under that game's
//! async mutex, held across the store read-modify-write and the broadcast
//! that follows, so participants observe updates in the order they were
//! applied.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::engine::{Color, Game, IllegalMoveError, Move, Outcome};
use crate::store::{Authenticator, GameId, GameRecord, GameStore, Identity, StoreError};
use crate::ws::manager::{Connection, ConnectionId, MessageSender, SessionRegistry};
use crate::ws::messages::ServerMessage;

// =========================================================================
// Errors
// =========================================================================

/// Why a session operation was refused. State is unchanged in every case.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("already taken")]
    AlreadyTaken,

    #[error("not a player in this game")]
    NotInGame,

    #[error("game is over")]
    GameOver,

    #[error("illegal move: {0}")]
    IllegalMove(IllegalMoveError),

    #[error("server error: {0}")]
    Internal(String),
}

impl From<IllegalMoveError> for SessionError {
    fn from(err: IllegalMoveError) -> Self {
        match err {
            IllegalMoveError::GameOver => SessionError::GameOver,
            other => SessionError::IllegalMove(other),
        }
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        SessionError::Internal(err.to_string())
    }
}

// =========================================================================
// Service
// =========================================================================

pub struct GameSessionService {
    auth: Arc<dyn Authenticator>,
    store: Arc<dyn GameStore>,
    registry: Arc<SessionRegistry>,
    /// One async mutex per game, created on first use.
    locks: Mutex<HashMap<GameId, Arc<tokio::sync::Mutex<()>>>>,
}

impl GameSessionService {
    pub fn new(
        auth: Arc<dyn Authenticator>,
        store: Arc<dyn GameStore>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            auth,
            store,
            registry,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    // -----------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------

    /// Resolve a token to its identity.
    pub fn authenticate(&self, token: &str) -> Result<Identity, SessionError> {
        self.auth
            .authenticate(token)
            .ok_or(SessionError::Unauthorized)
    }

    fn game_lock(&self, game_id: GameId) -> Result<Arc<tokio::sync::Mutex<()>>, SessionError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| SessionError::Internal("game lock table poisoned".into()))?;
        Ok(locks.entry(game_id).or_default().clone())
    }

    fn record(&self, game_id: GameId) -> Result<GameRecord, SessionError> {
        self.store
            .get_game_record(game_id)?
            .ok_or_else(|| SessionError::BadRequest(format!("bad game id {game_id}")))
    }

    // -----------------------------------------------------------------
    // REST-facing operations
    // -----------------------------------------------------------------

    /// Create a game named `name`.
    pub fn create_game(&self, token: &str, name: &str) -> Result<GameId, SessionError> {
        let identity = self.authenticate(token)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::BadRequest("game name is required".into()));
        }
        let game_id = self.store.create_game_record(name)?;
        info!(game_id, username = %identity.username, name, "game created");
        Ok(game_id)
    }

    /// Take the `color` seat of a game. Re-joining a seat the caller already
    /// holds succeeds without change.
    pub async fn join_game(
        &self,
        token: &str,
        color: Option<Color>,
        game_id: GameId,
    ) -> Result<(), SessionError> {
        let identity = self.authenticate(token)?;
        let color = color.ok_or_else(|| SessionError::BadRequest("bad color".into()))?;

        let lock = self.game_lock(game_id)?;
        let _guard = lock.lock().await;

        let record = self.record(game_id)?;
        match record.seat(color) {
            Some(holder) if holder == identity.username => return Ok(()),
            Some(_) => return Err(SessionError::AlreadyTaken),
            None => {}
        }
        self.store
            .update_seat(game_id, color, Some(identity.username.clone()))?;
        info!(game_id, username = %identity.username, %color, "seat taken");
        Ok(())
    }

    /// Every stored game.
    pub fn list_games(&self, token: &str) -> Result<Vec<GameRecord>, SessionError> {
        self.authenticate(token)?;
        Ok(self.store.list_game_records()?)
    }

    // -----------------------------------------------------------------
    // Live-session operations
    // -----------------------------------------------------------------

    /// Attach a transport to a game, seated as `color` or as an observer.
    ///
    /// The caller's connections in the game receive the current board;
    /// everyone else is told who joined.
    pub async fn connect(
        &self,
        token: &str,
        game_id: GameId,
        color: Option<Color>,
        conn_id: ConnectionId,
        sender: MessageSender,
    ) -> Result<(), SessionError> {
        let identity = self.authenticate(token)?;

        let lock = self.game_lock(game_id)?;
        let _guard = lock.lock().await;

        let record = self.record(game_id)?;
        if let Some(color) = color
            && record.seat(color) != Some(identity.username.as_str())
        {
            return Err(SessionError::AlreadyTaken);
        }

        self.registry
            .join(game_id, Connection::new(conn_id, identity.clone(), sender))
            .await;
        let delivered = self
            .registry
            .send_to(game_id, &identity.username, ServerMessage::load_game(&record.game))
            .await;
        if delivered == 0 {
            return Err(SessionError::Internal("connection closed".into()));
        }

        let role = match color {
            Some(color) => format!("joined as {color}"),
            None => "joined as an observer".to_string(),
        };
        info!(game_id, username = %identity.username, connection_id = conn_id, "{role}");
        self.registry
            .broadcast(
                game_id,
                Some(&identity.username),
                ServerMessage::notification(format!("{} {role}", identity.username)),
            )
            .await;
        Ok(())
    }

    /// Play `mv` for the caller, who must hold the seat of the side to move.
    pub async fn make_move(
        &self,
        token: &str,
        game_id: GameId,
        mv: Move,
    ) -> Result<(), SessionError> {
        let identity = self.authenticate(token)?;
        let username = identity.username.as_str();
        if !mv.is_on_board() {
            return Err(SessionError::BadRequest("move is off the board".into()));
        }

        let lock = self.game_lock(game_id)?;
        let _guard = lock.lock().await;

        let record = self.record(game_id)?;
        let turn = record.game.turn().ok_or(SessionError::GameOver)?;
        if record.seat(turn) != Some(username) {
            return Err(match record.color_of(username) {
                Some(_) => SessionError::IllegalMove(IllegalMoveError::WrongTurn),
                None => SessionError::NotInGame,
            });
        }
        let mut game = record.game;

        let moved = game.board().get(mv.start).map(|p| p.kind);
        if let Err(err) = game.apply_move(mv) {
            warn!(game_id, username, %mv, %err, "move rejected");
            return Err(err.into());
        }
        self.store.update_board(game_id, &game)?;
        info!(game_id, username, %mv, "move applied");

        self.registry
            .broadcast(game_id, None, ServerMessage::load_game(&game))
            .await;
        if let Some(kind) = moved {
            let text = format!("{username} moved {kind} from {} to {}", mv.start, mv.end);
            self.registry
                .broadcast(game_id, Some(username), ServerMessage::notification(text))
                .await;
        }
        if let Some(text) = status_notification(&game, !turn) {
            self.registry
                .broadcast(game_id, None, ServerMessage::notification(text))
                .await;
        }
        Ok(())
    }

    /// Concede the game for the caller's seat.
    pub async fn resign(&self, token: &str, game_id: GameId) -> Result<Outcome, SessionError> {
        let identity = self.authenticate(token)?;

        let lock = self.game_lock(game_id)?;
        let _guard = lock.lock().await;

        let record = self.record(game_id)?;
        let color = record
            .color_of(&identity.username)
            .ok_or(SessionError::NotInGame)?;
        let mut game = record.game;
        let outcome = game.resign(color)?;
        self.store.update_board(game_id, &game)?;
        info!(game_id, username = %identity.username, %color, "resigned");

        let text = match outcome.winner() {
            Some(winner) => format!("{} resigned, {winner} wins", identity.username),
            None => format!("{} resigned", identity.username),
        };
        self.registry
            .broadcast(game_id, None, ServerMessage::notification(text))
            .await;
        Ok(outcome)
    }

    /// Detach the caller's connection. The seat is kept and the game goes on.
    pub async fn leave(
        &self,
        token: &str,
        game_id: GameId,
        conn_id: ConnectionId,
    ) -> Result<(), SessionError> {
        let identity = self.authenticate(token)?;
        if !self.registry.leave(game_id, conn_id).await {
            return Err(SessionError::BadRequest(format!(
                "not connected to game {game_id}"
            )));
        }
        info!(game_id, username = %identity.username, connection_id = conn_id, "left game");
        self.announce_departure(game_id, &identity).await;
        Ok(())
    }

    /// Transport closed: drop the connection everywhere and tell the others.
    pub async fn disconnect(&self, conn_id: ConnectionId) {
        for (game_id, identity) in self.registry.remove_by_transport(conn_id).await {
            debug!(game_id, username = %identity.username, connection_id = conn_id, "disconnected");
            self.announce_departure(game_id, &identity).await;
        }
    }

    async fn announce_departure(&self, game_id: GameId, identity: &Identity) {
        self.registry
            .broadcast(
                game_id,
                Some(&identity.username),
                ServerMessage::notification(format!("{} left the game", identity.username)),
            )
            .await;
    }
}

/// Follow-up notification after a move, from the point of view of `side`,
/// the side now to move.
fn status_notification(game: &Game, side: Color) -> Option<String> {
    match game.terminal() {
        Some(Outcome::Checkmate { winner }) => {
            Some(format!("{side} is checkmated, {winner} wins"))
        }
        Some(Outcome::Stalemate) => Some("stalemate, the game is a draw".to_string()),
        Some(Outcome::Resigned { .. }) => None,
        None if game.is_in_check(side) => Some(format!("{side} is in check")),
        None => None,
    }
}

// =========================================================================
// Tests
// =========================================================================
