//! Session registry: the live connections attached to each game, and
//! best-effort delivery to them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};

use super::messages::ServerMessage;
use crate::store::{GameId, Identity};

/// Sending half of a connection's outbound queue. The socket writer task
/// owns the receiving half.
pub type MessageSender = mpsc::UnboundedSender<ServerMessage>;

/// A unique ID assigned to each transport connection.
pub type ConnectionId = u64;

/// One live participant in a game.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub identity: Identity,
    sender: MessageSender,
}

impl Connection {
    pub fn new(id: ConnectionId, identity: Identity, sender: MessageSender) -> Self {
        Self {
            id,
            identity,
            sender,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Queue `msg` for the socket writer; `false` means the transport is gone.
    fn send(&self, msg: ServerMessage) -> bool {
        self.is_open() && self.sender.send(msg).is_ok()
    }
}

/// Per-game sets of live connections.
#[derive(Debug)]
pub struct SessionRegistry {
    /// game_id → { connection_id → connection }
    games: RwLock<HashMap<GameId, HashMap<ConnectionId, Connection>>>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            games: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate an id for a new transport connection.
    pub fn next_connection_id(&self) -> ConnectionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Attach `conn` to `game_id`, detaching it from any other game first.
    pub async fn join(&self, game_id: GameId, conn: Connection) {
        let mut games = self.games.write().await;
        games.retain(|&gid, conns| {
            if gid != game_id {
                conns.remove(&conn.id);
            }
            !conns.is_empty()
        });
        debug!(
            game_id,
            connection_id = conn.id,
            username = %conn.identity.username,
            "connection joined"
        );
        games.entry(game_id).or_default().insert(conn.id, conn);
    }

    /// Detach one connection from a game. Returns whether it was attached.
    pub async fn leave(&self, game_id: GameId, conn_id: ConnectionId) -> bool {
        let mut games = self.games.write().await;
        let Some(conns) = games.get_mut(&game_id) else {
            return false;
        };
        let removed = conns.remove(&conn_id).is_some();
        if conns.is_empty() {
            games.remove(&game_id);
        }
        if removed {
            debug!(game_id, connection_id = conn_id, "connection left");
        }
        removed
    }

    /// Forget a closed transport wherever it is attached. Returns the games it
    /// was removed from, with the identity it was attached as.
    pub async fn remove_by_transport(&self, conn_id: ConnectionId) -> Vec<(GameId, Identity)> {
        let mut games = self.games.write().await;
        let mut removed = Vec::new();
        games.retain(|&gid, conns| {
            if let Some(conn) = conns.remove(&conn_id) {
                removed.push((gid, conn.identity));
            }
            !conns.is_empty()
        });
        if !removed.is_empty() {
            debug!(connection_id = conn_id, "transport closed, connection removed");
        }
        removed
    }

    /// Deliver `msg` to every open connection in the game except those
    /// belonging to `exclude`. Closed connections are pruned.
    pub async fn broadcast(&self, game_id: GameId, exclude: Option<&str>, msg: ServerMessage) {
        let stale = {
            let games = self.games.read().await;
            let Some(conns) = games.get(&game_id) else {
                return;
            };
            let mut stale: Vec<ConnectionId> = Vec::new();
            for conn in conns.values() {
                if exclude == Some(conn.identity.username.as_str()) {
                    if !conn.is_open() {
                        stale.push(conn.id);
                    }
                    continue;
                }
                if !conn.send(msg.clone()) {
                    stale.push(conn.id);
                }
            }
            stale
        };
        self.prune(game_id, &stale).await;
    }

    /// Deliver `msg` to every open connection of `username` in the game.
    /// Returns how many received it.
    pub async fn send_to(&self, game_id: GameId, username: &str, msg: ServerMessage) -> usize {
        let (delivered, stale) = {
            let games = self.games.read().await;
            let Some(conns) = games.get(&game_id) else {
                return 0;
            };
            let mut delivered = 0;
            let mut stale: Vec<ConnectionId> = Vec::new();
            for conn in conns.values().filter(|c| c.identity.username == username) {
                if conn.send(msg.clone()) {
                    delivered += 1;
                } else {
                    stale.push(conn.id);
                }
            }
            (delivered, stale)
        };
        self.prune(game_id, &stale).await;
        delivered
    }

    async fn prune(&self, game_id: GameId, stale: &[ConnectionId]) {
        if stale.is_empty() {
            return;
        }
        let mut games = self.games.write().await;
        if let Some(conns) = games.get_mut(&game_id) {
            for conn_id in stale {
                if conns.remove(conn_id).is_some() {
                    warn!(game_id, connection_id = conn_id, "removed stale connection");
                }
            }
            if conns.is_empty() {
                games.remove(&game_id);
            }
        }
    }

    /// Number of connections attached to a game.
    pub async fn connection_count(&self, game_id: GameId) -> usize {
        let games = self.games.read().await;
        games.get(&game_id).map_or(0, |c| c.len())
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn connect(
        reg: &SessionRegistry,
        username: &str,
    ) -> (Connection, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Connection::new(reg.next_connection_id(), Identity::new(username), tx);
        (conn, rx)
    }

    fn text(msg: &ServerMessage) -> String {
        msg.to_json()
    }

    #[tokio::test]
    async fn connection_ids_are_unique() {
        let reg = SessionRegistry::new();
        assert_ne!(reg.next_connection_id(), reg.next_connection_id());
    }

    #[tokio::test]
    async fn join_and_leave_track_counts() {
        let reg = SessionRegistry::new();
        let (a, _rx_a) = connect(&reg, "alice");
        let (b, _rx_b) = connect(&reg, "bob");
        let a_id = a.id;
        reg.join(1, a).await;
        reg.join(1, b).await;
        assert_eq!(reg.connection_count(1).await, 2);

        assert!(reg.leave(1, a_id).await);
        assert!(!reg.leave(1, a_id).await);
        assert_eq!(reg.connection_count(1).await, 1);
    }

    #[tokio::test]
    async fn join_moves_connection_between_games() {
        let reg = SessionRegistry::new();
        let (a, _rx) = connect(&reg, "alice");
        reg.join(1, a.clone()).await;
        reg.join(2, a).await;
        assert_eq!(reg.connection_count(1).await, 0);
        assert_eq!(reg.connection_count(2).await, 1);
    }

    #[tokio::test]
    async fn broadcast_skips_excluded_and_prunes_closed() {
        let reg = SessionRegistry::new();
        let (alice, mut rx_alice) = connect(&reg, "alice");
        let (bob, mut rx_bob) = connect(&reg, "bob");
        let (carol, rx_carol) = connect(&reg, "carol");
        let (dave, mut rx_dave) = connect(&reg, "dave");
        reg.join(1, alice).await;
        reg.join(1, bob).await;
        reg.join(1, carol).await;
        reg.join(1, dave).await;

        drop(rx_carol);

        let msg = ServerMessage::notification("alice moved pawn from e2 to e4");
        reg.broadcast(1, Some("alice"), msg.clone()).await;

        assert_eq!(text(&rx_bob.recv().await.unwrap()), text(&msg));
        assert_eq!(text(&rx_dave.recv().await.unwrap()), text(&msg));
        assert!(rx_alice.try_recv().is_err());
        assert_eq!(reg.connection_count(1).await, 3);
    }

    #[tokio::test]
    async fn broadcast_with_three_connections_one_closed() {
        let reg = SessionRegistry::new();
        let (alice, mut rx_alice) = connect(&reg, "alice");
        let (bob, mut rx_bob) = connect(&reg, "bob");
        let (carol, rx_carol) = connect(&reg, "carol");
        reg.join(1, alice).await;
        reg.join(1, bob).await;
        reg.join(1, carol).await;
        drop(rx_carol);

        reg.broadcast(1, None, ServerMessage::notification("hi")).await;

        assert!(rx_alice.recv().await.is_some());
        assert!(rx_bob.recv().await.is_some());
        assert_eq!(reg.connection_count(1).await, 2);
    }

    #[tokio::test]
    async fn broadcast_does_not_cross_games() {
        let reg = SessionRegistry::new();
        let (a, mut rx_a) = connect(&reg, "alice");
        let (b, mut rx_b) = connect(&reg, "bob");
        reg.join(1, a).await;
        reg.join(2, b).await;

        reg.broadcast(1, None, ServerMessage::notification("x")).await;
        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_to_reaches_only_that_identity() {
        let reg = SessionRegistry::new();
        let (a, mut rx_a) = connect(&reg, "alice");
        let (b, mut rx_b) = connect(&reg, "bob");
        reg.join(1, a).await;
        reg.join(1, b).await;

        let sent = reg.send_to(1, "bob", ServerMessage::load_game(&crate::engine::Game::new())).await;
        assert_eq!(sent, 1);
        assert!(rx_b.recv().await.is_some());
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_to_prunes_closed_connection() {
        let reg = SessionRegistry::new();
        let (b, rx_b) = connect(&reg, "bob");
        reg.join(1, b).await;
        drop(rx_b);
        assert_eq!(reg.send_to(1, "bob", ServerMessage::notification("x")).await, 0);
        assert_eq!(reg.connection_count(1).await, 0);
    }

    #[tokio::test]
    async fn remove_by_transport_clears_everywhere() {
        let reg = SessionRegistry::new();
        let (a, _rx_a) = connect(&reg, "alice");
        let (b, _rx_b) = connect(&reg, "bob");
        let a_id = a.id;
        reg.join(1, a).await;
        reg.join(1, b).await;

        let removed = reg.remove_by_transport(a_id).await;
        assert_eq!(removed, vec![(1, Identity::new("alice"))]);
        assert_eq!(reg.connection_count(1).await, 1);
        assert!(reg.remove_by_transport(a_id).await.is_empty());
    }

    #[tokio::test]
    async fn operations_on_unknown_game_are_noops() {
        let reg = SessionRegistry::new();
        reg.broadcast(99, None, ServerMessage::notification("x")).await;
        assert_eq!(reg.send_to(99, "alice", ServerMessage::notification("x")).await, 0);
        assert!(!reg.leave(99, 1).await);
    }
}
