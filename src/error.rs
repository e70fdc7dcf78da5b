use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("network failure: {0}")]
    Network(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("location permission denied: {0}")]
    PermissionDenied(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("server rejected request ({status}): {message}")]
    ServerRejection { status: u16, message: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Message shown to the transporter when an action fails.
    pub fn alert_message(&self) -> String {
        match self {
            AppError::ServerRejection { message, .. } => message.clone(),
            AppError::Validation(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return AppError::Internal(format!("invalid response body: {err}"));
        }

        match err.status() {
            Some(status) => AppError::ServerRejection {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => AppError::Network(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Network(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::PermissionDenied(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::ServerRejection { message, .. } => (StatusCode::BAD_GATEWAY, message.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
