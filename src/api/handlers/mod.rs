mod admin;
mod tokens;
mod users;

use axum::http::StatusCode;

use crate::api::response::ApiError;
use crate::error::AuthError;

pub use admin::{cluster_status, health};
pub use tokens::{issue_token, revoke_token, verify_token};
pub use users::{add_user, delete_credentials, delete_user, update_credentials};

/// Map an AuthError to an ApiError
fn auth_error(e: AuthError) -> ApiError {
    let status = match &e {
        AuthError::InvalidCredentials | AuthError::InvalidToken | AuthError::TokenExpired => {
            StatusCode::UNAUTHORIZED
        }
        AuthError::TokenNotFound | AuthError::UnknownUser(_) => StatusCode::NOT_FOUND,
        AuthError::AlreadyRegistered(_) => StatusCode::CONFLICT,
        AuthError::UnsupportedProvider(_) => StatusCode::BAD_REQUEST,
        AuthError::Persistence(_) | AuthError::Signing(_) => {
            tracing::error!(error = %e, "Request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    ApiError::from_status(status, e.to_string())
}
