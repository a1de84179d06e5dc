use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    extract::ApiJson,
    middleware::AuthUser,
    models::{Meeting, MeetingStatus, Preferences, User, UserProfile},
    services::{auth::validate_pattern, Lookup},
    state::AppState,
};

/// Favorite movies resolved per member on the members page
const FAVORITES_SHOWN: usize = 5;

#[derive(Debug, Deserialize)]
pub struct CheckUsernameRequest {
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPatternRequest {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    confirm_pattern: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    display_name_color: Option<String>,
    #[serde(default)]
    avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AvatarRequest {
    #[serde(default)]
    avatar: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesPatch {
    #[serde(default)]
    genres: Option<Vec<String>>,
    #[serde(default)]
    favorite_movie_ids: Option<Vec<i64>>,
    #[serde(default)]
    optional_text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePreferencesRequest {
    #[serde(default)]
    preferences: Option<PreferencesPatch>,
    #[serde(default)]
    avatar: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    token: String,
    user: UserProfile,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteMovie {
    tmdb_id: i64,
    title: String,
    poster: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewedMovie {
    id: Uuid,
    title: String,
    poster: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastReview {
    movie: ReviewedMovie,
    rating: i32,
    comment: String,
    watched_date: DateTime<Utc>,
}

/// One member on the members page
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    id: Uuid,
    username: String,
    display_name: Option<String>,
    display_name_color: String,
    avatar: Option<String>,
    preferences: Preferences,
    favorite_movies: Vec<FavoriteMovie>,
    last_review: Option<LastReview>,
    created_at: DateTime<Utc>,
}

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

async fn find_by_username(state: &AppState, username: &str) -> AppResult<User> {
    state
        .store
        .find_user_by_username(username)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

fn session(state: &AppState, user: &User) -> AppResult<Json<SessionResponse>> {
    let token = state.auth.issue_token(user.id)?;
    Ok(Json(SessionResponse {
        token,
        user: UserProfile::from(user),
    }))
}

/// POST /api/auth/check-username
pub async fn check_username(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<CheckUsernameRequest>,
) -> AppResult<Json<Value>> {
    let username = required(&body.username)
        .ok_or_else(|| AppError::InvalidInput("Username required".to_string()))?;
    let user = find_by_username(&state, username).await?;

    Ok(Json(json!({
        "hasPattern": user.has_pattern(),
        "avatar": user.avatar,
    })))
}

/// POST /api/auth/set-pattern
///
/// First login: stores the pattern hash and the optional profile fields.
pub async fn set_pattern(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<SetPatternRequest>,
) -> AppResult<Json<SessionResponse>> {
    let (Some(username), Some(pattern), Some(confirm)) = (
        required(&body.username),
        required(&body.pattern),
        required(&body.confirm_pattern),
    ) else {
        return Err(AppError::InvalidInput(
            "Username, pattern, and confirmation required".to_string(),
        ));
    };

    if pattern != confirm {
        return Err(AppError::InvalidInput("Patterns do not match".to_string()));
    }
    if !validate_pattern(pattern) {
        return Err(AppError::InvalidInput(
            "Invalid pattern. Must connect at least 4 dots.".to_string(),
        ));
    }

    let mut user = find_by_username(&state, username).await?;
    if user.has_pattern() {
        return Err(AppError::InvalidInput(
            "Pattern already set. Use login instead.".to_string(),
        ));
    }

    user.pattern_hash = Some(state.auth.hash_pattern(pattern).await?);
    if let Some(name) = required(&body.display_name) {
        user.display_name = Some(name.to_string());
    }
    if let Some(color) = required(&body.display_name_color) {
        user.display_name_color = color.to_string();
    }
    if let Some(avatar) = required(&body.avatar) {
        user.avatar = Some(avatar.to_string());
    }
    state.store.update_user(&user).await?;

    tracing::info!(user_id = %user.id, username = %user.username, "Pattern set");
    session(&state, &user)
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> AppResult<Json<SessionResponse>> {
    let (Some(username), Some(pattern)) = (required(&body.username), required(&body.pattern))
    else {
        return Err(AppError::InvalidInput(
            "Username and pattern required".to_string(),
        ));
    };

    let user = find_by_username(&state, username).await?;
    let Some(hash) = user.pattern_hash.as_deref() else {
        return Err(AppError::InvalidInput(
            "Pattern not set. Please set your pattern first.".to_string(),
        ));
    };

    if !state.auth.verify_pattern(pattern, hash).await? {
        tracing::info!(user_id = %user.id, "Rejected login with wrong pattern");
        return Err(AppError::Unauthorized("Invalid pattern".to_string()));
    }

    session(&state, &user)
}

/// GET /api/auth/me
pub async fn me(AuthUser(user): AuthUser) -> Json<UserProfile> {
    Json(UserProfile::from(&user))
}

/// PUT /api/auth/avatar
pub async fn update_avatar(
    State(state): State<Arc<AppState>>,
    AuthUser(mut user): AuthUser,
    ApiJson(body): ApiJson<AvatarRequest>,
) -> AppResult<Json<Value>> {
    user.avatar = body.avatar.filter(|a| !a.is_empty());
    state.store.update_user(&user).await?;

    Ok(Json(json!({
        "id": user.id,
        "username": user.username,
        "avatar": user.avatar,
    })))
}

/// PUT /api/auth/preferences
///
/// Only the fields present in the body are changed.
pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    AuthUser(mut user): AuthUser,
    ApiJson(body): ApiJson<UpdatePreferencesRequest>,
) -> AppResult<Json<Value>> {
    if let Some(patch) = body.preferences {
        if let Some(genres) = patch.genres {
            user.preferences.genres = genres;
        }
        if let Some(ids) = patch.favorite_movie_ids {
            user.preferences.favorite_movie_ids = ids;
        }
        if patch.optional_text.is_some() {
            user.preferences.optional_text = patch.optional_text;
        }
    }
    if let Some(avatar) = body.avatar.filter(|a| !a.is_empty()) {
        user.avatar = Some(avatar);
    }
    state.store.update_user(&user).await?;

    Ok(Json(json!({
        "id": user.id,
        "username": user.username,
        "preferences": user.preferences,
        "avatar": user.avatar,
    })))
}

async fn favorite_movies(state: &AppState, user: &User) -> Vec<FavoriteMovie> {
    let mut favorites = Vec::new();
    for &tmdb_id in user.preferences.favorite_movie_ids.iter().take(FAVORITES_SHOWN) {
        match state.movies.details(tmdb_id).await {
            Ok(details) => favorites.push(FavoriteMovie {
                tmdb_id: details.tmdb_id,
                title: details.title,
                poster: details.poster,
            }),
            Err(e) => {
                tracing::warn!(user_id = %user.id, tmdb_id, error = %e, "Skipping favorite movie");
            }
        }
    }
    favorites
}

/// Most recent review with a movie, from meetings already watched.
/// `watched` must be sorted latest first.
fn last_review(user_id: Uuid, watched: &[&Meeting], lookup: &Lookup) -> Option<LastReview> {
    watched.iter().find_map(|meeting| {
        meeting
            .ratings
            .iter()
            .filter(|r| r.user_id == user_id)
            .find_map(|r| {
                let movie = r.movie_id.and_then(|id| lookup.movie(&id))?;
                Some(LastReview {
                    movie: ReviewedMovie {
                        id: movie.id,
                        title: movie.title,
                        poster: movie.poster,
                    },
                    rating: r.rating,
                    comment: r.comment.clone(),
                    watched_date: meeting.watched_date,
                })
            })
    })
}

/// GET /api/auth/users
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
) -> AppResult<Json<Vec<MemberView>>> {
    let users = state.store.list_users().await?;
    let meetings = state.store.list_meetings().await?;
    let watched: Vec<&Meeting> = meetings
        .iter()
        .filter(|m| m.status == MeetingStatus::Watched)
        .collect();
    let reviewed_movies = watched
        .iter()
        .flat_map(|m| m.ratings.iter().filter_map(|r| r.movie_id))
        .collect();
    let lookup = Lookup::load(state.store.as_ref(), Vec::new(), reviewed_movies).await?;

    let mut members = Vec::with_capacity(users.len());
    for user in users {
        let favorite_movies = favorite_movies(&state, &user).await;
        let last_review = last_review(user.id, &watched, &lookup);
        members.push(MemberView {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            display_name_color: user.display_name_color,
            avatar: user.avatar,
            preferences: user.preferences,
            favorite_movies,
            last_review,
            created_at: user.created_at,
        });
    }

    Ok(Json(members))
}
