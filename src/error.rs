use thiserror::Error;

use crate::storage::StorageError;

/// Errors returned by user and token operations.
///
/// Everything except `Persistence` and `Signing` is a validation or lookup
/// failure and leaves state untouched. `Persistence` is raised after the
/// in-memory change was applied, so memory may be ahead of disk.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("User '{0}' already registered")]
    AlreadyRegistered(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Failed to persist state: {0}")]
    Persistence(#[from] StorageError),
    #[error("Failed to sign or verify token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("Token expired")]
    TokenExpired,
    #[error("Token not found")]
    TokenNotFound,
    #[error("User {0} does not exist")]
    UnknownUser(String),
    #[error("Unsupported cloud provider: {0}")]
    UnsupportedProvider(String),
}
