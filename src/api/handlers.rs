use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, Uri, header};
use tracing::info;

use crate::engine::Color;

use super::errors::ApiError;
use super::models::*;
use super::state::SharedState;

/// Token from the `authorization` header.
fn auth_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::Unauthorized)
}

// =========================================================================
// Health
// =========================================================================

/// GET /health
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime = state.start_time.elapsed().as_secs();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime,
    })
}

// =========================================================================
// Session
// =========================================================================

/// POST /session
///
/// Issues a token for any non-empty username. Stands in for the external
/// account service during development and testing.
pub async fn create_session(
    State(state): State<SharedState>,
    Json(input): Json<CreateSessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let username = input.username.trim();
    if username.is_empty() {
        return Err(ApiError::BadRequest("username is required".into()));
    }
    let auth_token = state
        .auth
        .issue(username)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    info!(username, "session issued");
    Ok(Json(SessionResponse {
        username: username.to_string(),
        auth_token,
    }))
}

// =========================================================================
// Games
// =========================================================================

/// POST /game
pub async fn create_game(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(input): Json<CreateGameRequest>,
) -> Result<Json<CreateGameResponse>, ApiError> {
    let token = auth_token(&headers)?;
    let game_id = state.service.create_game(token, &input.game_name)?;
    Ok(Json(CreateGameResponse { game_id }))
}

/// GET /game
pub async fn list_games(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<ListGamesResponse>, ApiError> {
    let token = auth_token(&headers)?;
    let games = state.service.list_games(token)?;
    Ok(Json(ListGamesResponse { games }))
}

/// PUT /game
pub async fn join_game(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(input): Json<JoinGameRequest>,
) -> Result<Json<EmptyResponse>, ApiError> {
    let token = auth_token(&headers)?;
    let game_id = input
        .game_id
        .ok_or_else(|| ApiError::BadRequest("gameID is required".into()))?;
    let color = input.player_color.as_deref().and_then(Color::from_str_loose);
    state.service.join_game(token, color, game_id).await?;
    Ok(Json(EmptyResponse {}))
}

/// Any unmatched route.
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use crate::api::router::create_router;
    use crate::api::state::{AppState, SharedState};
    use crate::config::AppConfig;
    use crate::engine::Color;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state() -> SharedState {
        AppState::new(AppConfig::default())
    }

    async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", token);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> axum::http::Response<Body> {
        app.clone().oneshot(req).await.unwrap()
    }

    // --- Health ---

    #[tokio::test]
    async fn health_returns_200() {
        let app = create_router(test_state());
        let resp = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "ok");
        assert!(json["uptime"].is_number());
    }

    #[tokio::test]
    async fn unknown_route_returns_404_json() {
        let app = create_router(test_state());
        let resp = send(&app, Request::get("/nonexistent").body(Body::empty()).unwrap()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let json = body_json(resp).await;
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn cors_preflight() {
        let app = create_router(test_state());
        let resp = send(
            &app,
            Request::builder()
                .method("OPTIONS")
                .uri("/game")
                .header("Origin", "http://localhost:3001")
                .header("Access-Control-Request-Method", "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get("access-control-allow-origin").is_some());
    }

    // --- Session ---

    #[tokio::test]
    async fn create_session_issues_token() {
        let state = test_state();
        let app = create_router(state.clone());
        let resp = send(&app, json_request("POST", "/session", None, r#"{"username":"alice"}"#)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["username"], "alice");
        let token = json["authToken"].as_str().unwrap();
        assert_eq!(
            state.service.authenticate(token).unwrap().username,
            "alice"
        );
    }

    #[tokio::test]
    async fn create_session_requires_username() {
        let app = create_router(test_state());
        let resp = send(&app, json_request("POST", "/session", None, r#"{"username":" "}"#)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    // --- Games ---

    #[tokio::test]
    async fn create_game_requires_auth() {
        let app = create_router(test_state());
        let resp = send(&app, json_request("POST", "/game", None, r#"{"gameName":"g"}"#)).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = send(&app, json_request("POST", "/game", Some("bogus"), r#"{"gameName":"g"}"#)).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_list_and_join() {
        let state = test_state();
        let alice = state.auth.issue("alice").unwrap();
        let bob = state.auth.issue("bob").unwrap();
        let app = create_router(state.clone());

        let resp = send(&app, json_request("POST", "/game", Some(&alice), r#"{"gameName":"friendly"}"#)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["gameID"], 1);

        let resp = send(
            &app,
            json_request("PUT", "/game", Some(&alice), r#"{"playerColor":"WHITE","gameID":1}"#),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = send(
            &app,
            json_request("PUT", "/game", Some(&bob), r#"{"playerColor":"WHITE","gameID":1}"#),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(resp).await["error"]["message"], "already taken");

        let resp = send(&app, json_request("GET", "/game", Some(&bob), "")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        let games = json["games"].as_array().unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0]["gameName"], "friendly");
        assert_eq!(games[0]["whiteUsername"], "alice");
        assert!(games[0]["blackUsername"].is_null());
    }

    #[tokio::test]
    async fn join_bad_requests() {
        let state = test_state();
        let alice = state.auth.issue("alice").unwrap();
        let app = create_router(state.clone());
        send(&app, json_request("POST", "/game", Some(&alice), r#"{"gameName":"g"}"#)).await;

        for body in [
            r#"{"playerColor":"GREEN","gameID":1}"#,
            r#"{"gameID":1}"#,
            r#"{"playerColor":"BLACK"}"#,
            r#"{"playerColor":"BLACK","gameID":99}"#,
        ] {
            let resp = send(&app, json_request("PUT", "/game", Some(&alice), body)).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
        }
    }

    #[tokio::test]
    async fn create_game_requires_name() {
        let state = test_state();
        let alice = state.auth.issue("alice").unwrap();
        let app = create_router(state);
        let resp = send(&app, json_request("POST", "/game", Some(&alice), r#"{"gameName":""}"#)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn join_records_seat() {
        let state = test_state();
        let alice = state.auth.issue("alice").unwrap();
        let app = create_router(state.clone());
        send(&app, json_request("POST", "/game", Some(&alice), r#"{"gameName":"g"}"#)).await;
        send(
            &app,
            json_request("PUT", "/game", Some(&alice), r#"{"playerColor":"black","gameID":1}"#),
        )
        .await;
        let record = state.service.list_games(&alice).unwrap().remove(0);
        assert_eq!(record.seat(Color::Black), Some("alice"));
    }
}
