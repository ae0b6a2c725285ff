use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth_error;
use crate::api::response::{ApiError, AppJson, JSend};
use crate::users::Credentials;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct IssueTokenRequest {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RevokeResponse {
    pub revoked: bool,
}

/// Token owner as reported by verification. Never carries the secret.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenOwnerResponse {
    #[serde(default)]
    pub creds: Credentials,
    pub name: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<IssueTokenRequest>,
) -> Result<Json<JSend<TokenResponse>>, ApiError> {
    let token = state
        .manager
        .issue_token(&req.name, &req.password)
        .map_err(auth_error)?;

    Ok(JSend::success(TokenResponse { token }))
}

pub async fn revoke_token(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<TokenRequest>,
) -> Result<Json<JSend<RevokeResponse>>, ApiError> {
    let revoked = state
        .manager
        .revoke_token(&req.token)
        .map_err(auth_error)?;

    Ok(JSend::success(RevokeResponse { revoked }))
}

pub async fn verify_token(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<TokenRequest>,
) -> Result<Json<JSend<TokenOwnerResponse>>, ApiError> {
    let user = state
        .manager
        .user_by_token(&req.token)
        .map_err(auth_error)?;

    Ok(JSend::success(TokenOwnerResponse {
        creds: user.credentials,
        name: user.id,
    }))
}
