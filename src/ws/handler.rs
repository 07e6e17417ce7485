//! WebSocket upgrade handler. Each socket gets its own outbound queue and a
//! writer task; a reader task feeds client commands to the session service.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::api::state::SharedState;

use super::manager::{ConnectionId, MessageSender};
use super::messages::{ServerMessage, UserGameCommand};

/// GET /ws, upgraded to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Core WebSocket session logic.
async fn handle_socket(socket: WebSocket, state: SharedState) {
    let conn_id = state.registry.next_connection_id();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let (mut sink, mut stream) = socket.split();
    debug!(connection_id = conn_id, "WS client connected");

    // Writer task: forward queued messages → WS sink.
    let mut writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink
                .send(Message::Text(msg.to_json().into()))
                .await
                .is_err()
            {
                break;
            }
        }
        let _ = sink.close().await;
    });

    // Reader task: handle client → server commands.
    let reader_state = state.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = stream.next().await {
            match msg {
                Message::Text(text) => {
                    handle_command(&reader_state, conn_id, &tx, &text).await;
                }
                Message::Close(_) => break,
                _ => {} // Binary / Ping / Pong handled by Axum
            }
        }
    });

    // Wait for either task to finish, then abort the other.
    tokio::select! {
        _ = &mut writer => { reader.abort(); }
        _ = &mut reader => { writer.abort(); }
    }

    state.service.disconnect(conn_id).await;
    debug!(connection_id = conn_id, "WS session cleaned up");
}

/// Dispatch one command. Failures go back to this socket only.
async fn handle_command(state: &SharedState, conn_id: ConnectionId, tx: &MessageSender, text: &str) {
    let cmd = match serde_json::from_str::<UserGameCommand>(text) {
        Ok(c) => c,
        Err(e) => {
            debug!(connection_id = conn_id, "invalid WS command: {e}");
            let _ = tx.send(ServerMessage::error(format!("bad request: {e}")));
            return;
        }
    };

    let service = &state.service;
    let game_id = cmd.game_id();
    let result = match cmd {
        UserGameCommand::Connect {
            auth_token,
            game_id,
            player_color,
        } => {
            service
                .connect(&auth_token, game_id, player_color, conn_id, tx.clone())
                .await
        }
        UserGameCommand::MakeMove {
            auth_token,
            game_id,
            mv,
        } => service.make_move(&auth_token, game_id, mv).await,
        UserGameCommand::Leave {
            auth_token,
            game_id,
        } => service.leave(&auth_token, game_id, conn_id).await,
        UserGameCommand::Resign {
            auth_token,
            game_id,
        } => service.resign(&auth_token, game_id).await.map(|_| ()),
    };

    if let Err(err) = result {
        debug!(connection_id = conn_id, game_id, %err, "command rejected");
        let _ = tx.send(ServerMessage::error(&err));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
