use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    extract::{ApiJson, ApiPath},
    middleware::{AdminAccess, AuthUser},
    models::{ActiveCycleView, Cycle, CycleView, MovieWithLikes},
    services::{calendar::parse_instant, Lookup},
    state::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCycleRequest {
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    movie_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    meeting_time: Option<String>,
    #[serde(default)]
    location: Option<String>,
}

/// Absent fields stay untouched; an empty `meetingTime` clears it
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCycleRequest {
    #[serde(default)]
    is_active: Option<bool>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    movie_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    meeting_time: Option<String>,
    #[serde(default)]
    location: Option<String>,
}

fn instant(raw: &str, field: &str) -> AppResult<chrono::DateTime<chrono::Utc>> {
    parse_instant(raw).ok_or_else(|| AppError::InvalidInput(format!("Invalid {}", field)))
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|v| !v.is_empty())
}

async fn cycle_views(state: &AppState, cycles: &[Cycle]) -> AppResult<Vec<CycleView>> {
    let users = cycles.iter().map(|c| c.created_by).collect();
    let movies = cycles.iter().flat_map(|c| c.movies.iter().copied()).collect();
    let lookup = Lookup::load(state.store.as_ref(), users, movies).await?;
    Ok(cycles.iter().map(|c| lookup.cycle(c)).collect())
}

async fn cycle_view(state: &AppState, cycle: &Cycle) -> AppResult<CycleView> {
    let mut views = cycle_views(state, std::slice::from_ref(cycle)).await?;
    views
        .pop()
        .ok_or_else(|| AppError::Internal("Cycle view missing".to_string()))
}

async fn find_cycle(state: &AppState, id: Uuid) -> AppResult<Cycle> {
    state
        .store
        .find_cycle(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Cycle not found".to_string()))
}

/// GET /api/cycles
pub async fn list(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
) -> AppResult<Json<Vec<CycleView>>> {
    let cycles = state.store.list_cycles().await?;
    Ok(Json(cycle_views(&state, &cycles).await?))
}

/// GET /api/cycles/active
///
/// `null` when no cycle is running.
pub async fn active(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
) -> AppResult<Json<Option<ActiveCycleView>>> {
    let Some(cycle) = state.store.active_cycle().await? else {
        return Ok(Json(None));
    };

    let likes: HashMap<Uuid, i64> = state
        .store
        .like_counts(cycle.id)
        .await?
        .into_iter()
        .map(|l| (l.movie_id, l.count))
        .collect();
    let view = cycle_view(&state, &cycle).await?;

    Ok(Json(Some(ActiveCycleView {
        id: view.id,
        is_active: view.is_active,
        start_date: view.start_date,
        end_date: view.end_date,
        meeting_time: view.meeting_time,
        location: view.location,
        movies: view
            .movies
            .into_iter()
            .map(|movie| MovieWithLikes {
                like_count: likes.get(&movie.id).copied().unwrap_or(0),
                movie,
            })
            .collect(),
        created_by: view.created_by,
        created_at: view.created_at,
    })))
}

/// POST /api/cycles
///
/// The new cycle starts active and every other cycle is deactivated.
pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    _: AdminAccess,
    ApiJson(body): ApiJson<CreateCycleRequest>,
) -> AppResult<(StatusCode, Json<CycleView>)> {
    let (Some(start), Some(end), Some(movies)) = (
        non_empty(body.start_date.as_deref()),
        non_empty(body.end_date.as_deref()),
        body.movie_ids.filter(|ids| !ids.is_empty()),
    ) else {
        return Err(AppError::InvalidInput(
            "Start date, end date, and movie IDs required".to_string(),
        ));
    };

    let cycle = Cycle {
        id: Uuid::new_v4(),
        is_active: true,
        start_date: instant(start, "start date")?,
        end_date: instant(end, "end date")?,
        meeting_time: non_empty(body.meeting_time.as_deref())
            .map(|t| instant(t, "meeting time"))
            .transpose()?,
        location: body.location.filter(|l| !l.trim().is_empty()),
        movies,
        created_by: user.id,
        created_at: chrono::Utc::now(),
    };

    let deactivated = state.store.deactivate_cycles(None).await?;
    state.store.insert_cycle(&cycle).await?;
    tracing::info!(cycle_id = %cycle.id, movies = cycle.movies.len(), deactivated, "Created cycle");

    Ok((StatusCode::CREATED, Json(cycle_view(&state, &cycle).await?)))
}

/// PUT /api/cycles/:id
pub async fn update(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    _: AdminAccess,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateCycleRequest>,
) -> AppResult<Json<CycleView>> {
    let mut cycle = find_cycle(&state, id).await?;

    // All fields parse before any other cycle is deactivated
    let start_date = non_empty(body.start_date.as_deref())
        .map(|s| instant(s, "start date"))
        .transpose()?;
    let end_date = non_empty(body.end_date.as_deref())
        .map(|e| instant(e, "end date"))
        .transpose()?;
    let meeting_time = body
        .meeting_time
        .as_deref()
        .map(|t| {
            non_empty(Some(t))
                .map(|t| instant(t, "meeting time"))
                .transpose()
        })
        .transpose()?;

    if let Some(start) = start_date {
        cycle.start_date = start;
    }
    if let Some(end) = end_date {
        cycle.end_date = end;
    }
    if let Some(time) = meeting_time {
        cycle.meeting_time = time;
    }
    if let Some(movies) = body.movie_ids {
        cycle.movies = movies;
    }
    if let Some(location) = body.location {
        cycle.location = Some(location).filter(|l| !l.trim().is_empty());
    }

    if let Some(active) = body.is_active {
        if active {
            let deactivated = state.store.deactivate_cycles(Some(cycle.id)).await?;
            tracing::info!(cycle_id = %cycle.id, deactivated, "Activating cycle");
        }
        cycle.is_active = active;
    }

    state.store.update_cycle(&cycle).await?;
    Ok(Json(cycle_view(&state, &cycle).await?))
}

/// POST /api/cycles/:id/close
///
/// The most liked movie wins; the cycle is deactivated.
pub async fn close(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    _: AdminAccess,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    let mut cycle = find_cycle(&state, id).await?;

    let counts = state.store.like_counts(cycle.id).await?;
    let Some(winner) = counts.first().map(|c| c.movie_id) else {
        return Err(AppError::InvalidInput(
            "No votes found for this cycle".to_string(),
        ));
    };

    cycle.is_active = false;
    state.store.update_cycle(&cycle).await?;
    tracing::info!(cycle_id = %cycle.id, winner = %winner, "Closed cycle");

    Ok(Json(json!({
        "winner": winner,
        "voteCounts": counts,
        "message": "Cycle closed successfully",
    })))
}
