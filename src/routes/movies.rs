use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    middleware::AuthUser,
    models::{Movie, MovieDetails, MovieSearchPage},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    page: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMovieRequest {
    #[serde(default)]
    tmdb_id: Option<i64>,
}

/// Unparseable or missing pages fall back to the first one
fn page_number(raw: Option<&str>) -> u32 {
    raw.and_then(|p| p.trim().parse::<u32>().ok())
        .filter(|p| *p > 0)
        .unwrap_or(1)
}

/// GET /api/movies/search?q=&page=
pub async fn search(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    ApiQuery(params): ApiQuery<SearchQuery>,
) -> AppResult<Json<MovieSearchPage>> {
    let query = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::InvalidInput("Search query required".to_string()))?;

    let page = state
        .movies
        .search(query, page_number(params.page.as_deref()))
        .await?;
    Ok(Json(page))
}

/// GET /api/movies/tmdb/:tmdbId
pub async fn tmdb_details(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    Path(tmdb_id): Path<String>,
) -> AppResult<Json<MovieDetails>> {
    let tmdb_id: i64 = tmdb_id
        .trim()
        .parse()
        .map_err(|_| AppError::InvalidInput("Invalid movie ID".to_string()))?;
    Ok(Json(state.movies.details(tmdb_id).await?))
}

/// POST /api/movies
///
/// Answers 200 with the stored record when the TMDB id is already known,
/// 201 when it had to be fetched and created.
pub async fn add(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiJson(body): ApiJson<AddMovieRequest>,
) -> AppResult<(StatusCode, Json<Movie>)> {
    let tmdb_id = body
        .tmdb_id
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::InvalidInput("TMDB ID required".to_string()))?;

    if let Some(existing) = state.store.find_movie_by_tmdb_id(tmdb_id).await? {
        return Ok((StatusCode::OK, Json(existing)));
    }

    let details = state.movies.details(tmdb_id).await?;
    let (movie, created) = state
        .store
        .insert_movie(&Movie::from_details(details, Some(user.id)))
        .await?;

    let status = if created {
        tracing::info!(movie_id = %movie.id, tmdb_id, title = %movie.title, added_by = %user.id, "Added movie");
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(movie)))
}

/// GET /api/movies
pub async fn list(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
) -> AppResult<Json<Vec<Movie>>> {
    Ok(Json(state.store.list_movies().await?))
}

/// GET /api/movies/:id
pub async fn get(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Movie>> {
    let movie = state
        .store
        .find_movie(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Movie not found".to_string()))?;
    Ok(Json(movie))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_number_defaults() {
        assert_eq!(page_number(None), 1);
        assert_eq!(page_number(Some("abc")), 1);
        assert_eq!(page_number(Some("0")), 1);
        assert_eq!(page_number(Some("3")), 3);
    }
}
