use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tracing::{info, instrument};

use crate::{backend::credential, envelope::Envelope, error::ApiError, state::AppState};

pub const LOGIN_FALLBACK_MESSAGE: &str = "Login failed";
pub const ME_FALLBACK_MESSAGE: &str = "Failed to get user";
pub const LOGGED_OUT_MESSAGE: &str = "Logged out successfully";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", get(logout).post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me))
}

#[instrument(skip(state, body))]
pub async fn login(State(state): State<AppState>, body: Bytes) -> Result<Json<Envelope>, ApiError> {
    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Transport(format!("unreadable login body: {}", e)))?;

    let envelope = state
        .backend
        .login(payload)
        .await?
        .into_result(LOGIN_FALLBACK_MESSAGE)?;

    info!("login forwarded");
    Ok(Json(envelope))
}

#[instrument(skip(state, headers))]
pub async fn get_me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Envelope>, ApiError> {
    let authorization = credential(&headers).ok_or(ApiError::AuthMissing)?;

    let envelope = state
        .backend
        .me(authorization)
        .await?
        .into_result(ME_FALLBACK_MESSAGE)?;

    Ok(Json(envelope))
}

/// Nothing to revoke here: the client finishes logout by dropping its token.
#[instrument]
pub async fn logout() -> Json<Envelope> {
    Json(Envelope::ok(LOGGED_OUT_MESSAGE))
}
