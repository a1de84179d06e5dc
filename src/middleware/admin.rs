use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};

use crate::{error::AppError, models::User, state::AppState};

pub const ADMIN_PASSWORD_HEADER: &str = "x-admin-password";

fn supplied_password(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(ADMIN_PASSWORD_HEADER)
        .and_then(|h| h.to_str().ok())
}

/// Compares the header against the configured secret
pub fn check_admin_password(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let expected = state
        .admin_password
        .as_deref()
        .ok_or_else(|| AppError::Internal("Admin password not configured".to_string()))?;

    match supplied_password(headers) {
        Some(given) if given == expected => Ok(()),
        _ => Err(AppError::Forbidden("Invalid admin password".to_string())),
    }
}

/// Admin flag on the account, or a correct admin header
pub fn has_admin_access(state: &AppState, headers: &HeaderMap, user: &User) -> bool {
    user.is_admin || check_admin_password(state, headers).is_ok()
}

/// Guards a handler behind the `x-admin-password` header
#[derive(Debug, Clone, Copy)]
pub struct AdminAccess;

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAccess {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        check_admin_password(state, &parts.headers).map(|_| AdminAccess)
    }
}
