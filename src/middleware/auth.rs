use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{error::AppError, models::User, state::AppState};

/// The authenticated caller, resolved from `Authorization: Bearer <token>`
///
/// Rejects with 401 when the header is missing, the token does not verify,
/// or the account behind it no longer exists.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(|h| h.strip_prefix("Bearer ").unwrap_or(h).trim())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("No token provided".to_string()))?;

        let claims = state.auth.verify_token(token)?;

        let user = state
            .store
            .find_user(claims.user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

        tracing::Span::current().record("user_id", tracing::field::display(user.id));
        Ok(AuthUser(user))
    }
}
