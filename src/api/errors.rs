use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::service::SessionError;

/// Structured API error that serializes to JSON.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    Forbidden(String),
    NotFound(String),
    InternalError(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "unauthorized".to_string(),
            ),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("not found: {what}"),
            ),
            ApiError::InternalError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
            }
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Unauthorized => ApiError::Unauthorized,
            SessionError::AlreadyTaken | SessionError::NotInGame => {
                ApiError::Forbidden(err.to_string())
            }
            SessionError::BadRequest(_)
            | SessionError::GameOver
            | SessionError::IllegalMove(_) => ApiError::BadRequest(err.to_string()),
            SessionError::Internal(_) => ApiError::InternalError(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::IllegalMoveError;
    use http_body_util::BodyExt;

    async fn error_to_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = response.into_body();
        let bytes = body.collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        (status, json)
    }

    #[tokio::test]
    async fn bad_request_returns_400() {
        let (status, json) = error_to_json(ApiError::BadRequest("bad input".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
        assert_eq!(json["error"]["message"], "bad input");
    }

    #[tokio::test]
    async fn not_found_returns_404() {
        let (status, json) = error_to_json(ApiError::NotFound("/nope".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn session_errors_map_to_statuses() {
        let cases = [
            (SessionError::Unauthorized, StatusCode::UNAUTHORIZED),
            (SessionError::AlreadyTaken, StatusCode::FORBIDDEN),
            (SessionError::NotInGame, StatusCode::FORBIDDEN),
            (SessionError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (SessionError::GameOver, StatusCode::BAD_REQUEST),
            (
                SessionError::IllegalMove(IllegalMoveError::NotLegal),
                StatusCode::BAD_REQUEST,
            ),
            (
                SessionError::Internal("db".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let (status, _) = error_to_json(err.into()).await;
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn already_taken_message() {
        let (_, json) = error_to_json(SessionError::AlreadyTaken.into()).await;
        assert_eq!(json["error"]["message"], "already taken");
    }
}
