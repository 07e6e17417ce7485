//! WebSocket module: live game sessions.
//!
//! - [`messages`]: Typed command/message envelopes.
//! - [`manager`]: Per-game connection tracking and delivery.
//! - [`handler`]: Axum WebSocket upgrade handler.

pub mod handler;
pub mod manager;
pub mod messages;

pub use handler::ws_handler;
pub use manager::SessionRegistry;
pub use messages::{ServerMessage, UserGameCommand};
