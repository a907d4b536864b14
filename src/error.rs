//! Error types for Gatekeeper

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config file not found. Run 'gatekeeper init' first.")]
    ConfigNotFound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Token problems. All of these surface to the client as a generic
    // 401; the specific kind stays server-side for logging.
    #[error("token payload could not be parsed")]
    Malformed,

    #[error("token signature verification failed")]
    InvalidSignature,

    #[error("token is expired")]
    Expired,

    #[error("token has been revoked")]
    Revoked,

    #[error("wrong token kind for this operation")]
    WrongTokenKind,

    #[error("no bearer token presented")]
    MissingToken,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("email already registered")]
    EmailTaken,

    #[error("insufficient role or permissions")]
    Forbidden,

    #[error("rate limit exceeded")]
    Throttled { retry_after_secs: u64 },

    #[error("ephemeral store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("password hashing error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl Error {
    /// True for the token-validity family that must not be
    /// distinguishable from the client's point of view.
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            Error::Malformed
                | Error::InvalidSignature
                | Error::Expired
                | Error::Revoked
                | Error::WrongTokenKind
                | Error::MissingToken
        )
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log the precise failure before collapsing it into a generic
        // client-facing message.
        match &self {
            e if e.is_token_error() => tracing::warn!(kind = %e, "rejected token"),
            Error::InvalidCredentials => tracing::warn!("rejected login attempt"),
            Error::EmailTaken => tracing::warn!("signup with an already registered email"),
            Error::Forbidden => tracing::warn!("insufficient role for operation"),
            Error::Throttled { retry_after_secs } => {
                tracing::warn!(retry_after_secs = *retry_after_secs, "request throttled")
            }
            Error::StoreUnavailable(msg) => tracing::error!(%msg, "ephemeral store unavailable"),
            e => tracing::error!(error = %e, "request failed"),
        }

        match self {
            e if e.is_token_error() => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "invalid or expired credentials" })),
            )
                .into_response(),
            Error::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "invalid credentials" })),
            )
                .into_response(),
            Error::EmailTaken => (
                StatusCode::CONFLICT,
                Json(json!({ "error": "email already registered" })),
            )
                .into_response(),
            Error::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "insufficient role or permissions" })),
            )
                .into_response(),
            Error::Throttled { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                [("Retry-After", retry_after_secs.to_string())],
                Json(json!({
                    "error": "rate limit exceeded",
                    "retry_after_seconds": retry_after_secs,
                })),
            )
                .into_response(),
            Error::StoreUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                [("Retry-After", "1".to_string())],
                Json(json!({ "error": "service temporarily unavailable" })),
            )
                .into_response(),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal server error" })),
            )
                .into_response(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
