//! authn - authentication authority for a clustered storage system
//!
//! This crate provides user registration and signed session tokens with:
//! - Per-cloud-provider credentials embedded in every token (aws, gcp, dfc)
//! - A monotonic version counter bumped by every committed change
//! - JSON persistence of users, tokens and the last known cluster map
//! - Background replication of the valid-token list to the primary proxy,
//!   following the primary when it moves
//! - Active expiration via a background task
//! - REST API

pub mod api;
pub mod cluster;
pub mod config;
pub mod error;
pub mod expiration;
pub mod manager;
pub mod storage;
#[cfg(test)]
pub mod testutil;
pub mod tokens;
pub mod users;
pub mod version;

use std::sync::Arc;

use cluster::ProxyClient;
use config::Config;
use manager::UserManager;

pub use error::AuthError;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub manager: Arc<UserManager>,
    pub proxy: Arc<ProxyClient>,
}
