use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::SharedState;
use crate::ws;

/// Build the Axum router with all routes and middleware.
pub fn create_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        // Development token issuing
        .route("/session", post(handlers::create_session))
        // Games
        .route(
            "/game",
            post(handlers::create_game)
                .get(handlers::list_games)
                .put(handlers::join_game),
        )
        // Live game sessions
        .route("/ws", get(ws::ws_handler))
        .fallback(handlers::not_found)
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
