use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    extract::{ApiJson, ApiPath},
    middleware::AuthUser,
    models::{Vote, VoteType},
    state::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteRequest {
    #[serde(default)]
    movie_id: Option<Uuid>,
    #[serde(default)]
    cycle_id: Option<Uuid>,
    #[serde(default)]
    vote_type: Option<String>,
    #[serde(default)]
    review: Option<String>,
}

/// POST /api/votes
///
/// A second vote on the same movie replaces the first.
pub async fn cast(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiJson(body): ApiJson<CastVoteRequest>,
) -> AppResult<(StatusCode, Json<Vote>)> {
    let (Some(movie_id), Some(cycle_id), Some(vote_type)) =
        (body.movie_id, body.cycle_id, body.vote_type.as_deref())
    else {
        return Err(AppError::InvalidInput(
            "Movie ID, cycle ID, and vote type required".to_string(),
        ));
    };
    let vote_type: VoteType = vote_type.parse().map_err(|_| {
        AppError::InvalidInput("Vote type must be \"like\" or \"dislike\"".to_string())
    })?;

    let cycle = state
        .store
        .find_cycle(cycle_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Cycle not found".to_string()))?;

    let now = Utc::now();
    if !cycle.is_active {
        return Err(AppError::InvalidInput("Cycle is not active".to_string()));
    }
    if !cycle.is_open_at(now) {
        return Err(AppError::InvalidInput(
            "Voting period has not started or has ended".to_string(),
        ));
    }
    if !cycle.contains_movie(&movie_id) {
        return Err(AppError::InvalidInput(
            "Movie is not in this cycle".to_string(),
        ));
    }

    let vote = Vote {
        id: Uuid::new_v4(),
        user_id: user.id,
        movie_id,
        cycle_id,
        vote_type,
        review: body.review.filter(|r| !r.trim().is_empty()),
        created_at: now,
    };
    state.store.replace_vote(&vote).await?;
    tracing::info!(cycle_id = %cycle_id, movie_id = %movie_id, vote_type = %vote_type, "Vote cast");

    Ok((StatusCode::CREATED, Json(vote)))
}

/// GET /api/votes/cycle/:cycleId
pub async fn my_cycle_votes(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(cycle_id): ApiPath<Uuid>,
) -> AppResult<Json<Vec<Vote>>> {
    Ok(Json(state.store.user_cycle_votes(user.id, cycle_id).await?))
}
