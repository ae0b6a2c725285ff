use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth_error;
use crate::api::response::{ApiError, AppJson, JSend};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct AddUserRequest {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateCredentialsRequest {
    pub value: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UserChangeResponse {
    pub name: String,
    pub version: i64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CredentialsResponse {
    /// False when the request left the stored credentials as they were
    pub changed: bool,
    pub provider: String,
    pub version: i64,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn add_user(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<AddUserRequest>,
) -> Result<Json<JSend<UserChangeResponse>>, ApiError> {
    state
        .manager
        .add_user(&req.name, &req.password)
        .map_err(auth_error)?;

    Ok(JSend::success(UserChangeResponse {
        name: req.name,
        version: state.manager.version(),
    }))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<JSend<UserChangeResponse>>, ApiError> {
    state.manager.delete_user(&user_id).map_err(auth_error)?;

    Ok(JSend::success(UserChangeResponse {
        name: user_id,
        version: state.manager.version(),
    }))
}

pub async fn update_credentials(
    State(state): State<Arc<AppState>>,
    Path((user_id, provider)): Path<(String, String)>,
    AppJson(req): AppJson<UpdateCredentialsRequest>,
) -> Result<Json<JSend<CredentialsResponse>>, ApiError> {
    let changed = state
        .manager
        .update_credentials(&user_id, &provider, &req.value)
        .map_err(auth_error)?;

    Ok(JSend::success(CredentialsResponse {
        changed,
        provider,
        version: state.manager.version(),
    }))
}

pub async fn delete_credentials(
    State(state): State<Arc<AppState>>,
    Path((user_id, provider)): Path<(String, String)>,
) -> Result<Json<JSend<CredentialsResponse>>, ApiError> {
    let changed = state
        .manager
        .delete_credentials(&user_id, &provider)
        .map_err(auth_error)?;

    Ok(JSend::success(CredentialsResponse {
        changed,
        provider,
        version: state.manager.version(),
    }))
}
