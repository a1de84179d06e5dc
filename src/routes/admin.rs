use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    extract::{ApiJson, ApiPath},
    middleware::AdminAccess,
    models::{AdminUserSummary, User},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct VerifyPasswordRequest {
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    username: Option<String>,
}

/// POST /api/admin/verify-password
///
/// Only confirms the secret; it does not grant anything by itself.
pub async fn verify_password(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<VerifyPasswordRequest>,
) -> AppResult<Json<Value>> {
    let expected = state
        .admin_password
        .as_deref()
        .ok_or_else(|| AppError::Internal("Admin password not configured".to_string()))?;

    match body.password.as_deref() {
        Some(given) if given == expected => Ok(Json(json!({
            "success": true,
            "message": "Admin access granted",
        }))),
        _ => Err(AppError::Unauthorized("Invalid admin password".to_string())),
    }
}

/// POST /api/admin/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    _: AdminAccess,
    ApiJson(body): ApiJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<AdminUserSummary>)> {
    let username = body
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::InvalidInput("Username required".to_string()))?;

    if state.store.find_user_by_username(username).await?.is_some() {
        return Err(AppError::Conflict("Username already exists".to_string()));
    }

    let user = User::new(username);
    state.store.insert_user(&user).await?;
    tracing::info!(user_id = %user.id, username = %user.username, "Created user");

    Ok((StatusCode::CREATED, Json(AdminUserSummary::from(&user))))
}

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _: AdminAccess,
) -> AppResult<Json<Vec<AdminUserSummary>>> {
    let users = state.store.list_users().await?;
    Ok(Json(users.iter().map(AdminUserSummary::from).collect()))
}

/// POST /api/admin/users/:id/reset-pattern
pub async fn reset_pattern(
    State(state): State<Arc<AppState>>,
    _: AdminAccess,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    let mut user = state
        .store
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    user.pattern_hash = None;
    state.store.update_user(&user).await?;
    tracing::info!(user_id = %user.id, "Pattern reset");

    Ok(Json(json!({
        "id": user.id,
        "username": user.username,
        "message": "Pattern reset successfully. User must set a new pattern.",
    })))
}

/// DELETE /api/admin/users/:id
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    _: AdminAccess,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    if !state.store.delete_user(id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    tracing::info!(user_id = %id, "Deleted user");

    Ok(Json(json!({ "message": "User deleted successfully" })))
}
