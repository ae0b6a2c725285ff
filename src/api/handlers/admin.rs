use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::response::JSend;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub tokens: usize,
    pub users: usize,
    pub version: i64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ClusterStatusResponse {
    pub primary_url: String,
    pub proxies: usize,
    pub storage_nodes: usize,
    pub version: i64,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health(State(state): State<Arc<AppState>>) -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse {
        status: "healthy".to_string(),
        tokens: state.manager.token_count(),
        users: state.manager.user_count(),
        version: state.manager.version(),
    })
}

pub async fn cluster_status(
    State(state): State<Arc<AppState>>,
) -> Json<JSend<ClusterStatusResponse>> {
    let snapshot = state.proxy.snapshot().await;
    let (proxies, storage_nodes) = snapshot
        .smap
        .as_ref()
        .map(|smap| (smap.proxies.len(), smap.storage_nodes.len()))
        .unwrap_or_default();

    JSend::success(ClusterStatusResponse {
        primary_url: snapshot.url,
        proxies,
        storage_nodes,
        version: state.manager.version(),
    })
}
