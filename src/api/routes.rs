//! API route handlers

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use serde_json::json;

use super::server::AppState;
use crate::auth::bearer_token;
use crate::auth::models::{
    AuthContext, LoginRequest, LoginResponse, LogoutRequest, RefreshResponse, SignupRequest,
    SignupResponse,
};
use crate::error::{Error, Result};

// Health check

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

// Session routes

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse> {
    let credential = state
        .authenticator
        .signup(&req.email, &req.password, state.default_role)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "User created".to_string(),
            email: credential.email,
            role: credential.role,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    let pair = state
        .authenticator
        .login(&req.email, &req.password, Utc::now())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            message: "Login successful".to_string(),
            access_token: pair.access.token,
            refresh_token: pair.refresh.token,
        }),
    ))
}

/// Mint a new access token. The refresh token travels in the
/// Authorization header like any other bearer credential.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let token = bearer_token(&headers).ok_or(Error::MissingToken)?;
    let access = state.authenticator.refresh(token, Utc::now()).await?;

    Ok((
        StatusCode::CREATED,
        Json(RefreshResponse {
            access_token: access.token,
            expires_at: access.expires_at.timestamp(),
        }),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<LogoutRequest>,
) -> Result<impl IntoResponse> {
    state
        .authenticator
        .logout(
            req.access_token.as_deref(),
            req.refresh_token.as_deref(),
            Utc::now(),
        )
        .await?;

    Ok(Json(json!({ "message": "Logged out" })))
}

// Protected routes

/// Who am I - available to any authenticated caller
pub async fn me(Extension(ctx): Extension<AuthContext>) -> impl IntoResponse {
    Json(ctx)
}

/// Admin-only probe
pub async fn admin_status(Extension(ctx): Extension<AuthContext>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "subject_id": ctx.subject_id,
        "role": ctx.role,
    }))
}
