use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    middleware::{AdminAccess, AuthUser},
    models::{
        meeting::{
            text_len, validate_comment, validate_score, MAX_SUGGESTIONS_PER_USER,
            MAX_VOTE_REASON_CHARS,
        },
        Meeting, MeetingView, MeetingVote, MeetingVoteType, MeetingVoteView, Movie, Suggestion,
        UserSummary,
    },
    services::{
        calendar::parse_instant,
        populate::meeting_views,
        recommendation::{recommend_candidate, Recommendation},
        suggestions::{
            generate_suggestions, get_or_create_movie, AiSuggestion, DEFAULT_SUGGESTION_LIMIT,
            MAX_SUGGESTION_LIMIT,
        },
        Lookup,
    },
    state::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMeetingRequest {
    #[serde(default)]
    watched_date: Option<String>,
    #[serde(default)]
    movie_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    theme: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeetingRequest {
    #[serde(default)]
    watched_date: Option<String>,
    #[serde(default)]
    movie_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    theme: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingRequest {
    #[serde(default)]
    rating: Option<i32>,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    movie_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct GatheringRatingRequest {
    #[serde(default)]
    rating: Option<i32>,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestRequest {
    #[serde(default)]
    tmdb_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRequest {
    #[serde(default)]
    movie_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingVoteRequest {
    #[serde(default)]
    movie_id: Option<Uuid>,
    #[serde(default)]
    vote_type: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionsQuery {
    #[serde(default)]
    limit: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewMeeting {
    id: Uuid,
    watched_date: DateTime<Utc>,
    location: Option<String>,
}

/// One review of a movie, with the meeting it was written for
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieReview {
    id: Uuid,
    user: Option<UserSummary>,
    rating: i32,
    comment: String,
    meeting: ReviewMeeting,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedMovie {
    id: Uuid,
    title: String,
    poster: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestResponse {
    success: bool,
    movie: SuggestedMovie,
    remaining_suggestions: usize,
}

#[derive(Debug, Serialize)]
pub struct CandidatesResponse {
    candidates: Vec<Movie>,
    votes: Vec<MeetingVoteView>,
}

async fn find_meeting(state: &AppState, id: Uuid) -> AppResult<Meeting> {
    state
        .store
        .find_meeting(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Meeting not found".to_string()))
}

async fn view(state: &AppState, meeting: &Meeting) -> AppResult<MeetingView> {
    meeting_views(state.store.as_ref(), std::slice::from_ref(meeting))
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal("Meeting view missing".to_string()))
}

/// Every id must name a stored movie
async fn ensure_movies_exist(state: &AppState, ids: &[Uuid]) -> AppResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let mut unique = ids.to_vec();
    unique.sort();
    unique.dedup();
    let found = state.store.find_movies(&unique).await?;
    if found.len() != unique.len() {
        return Err(AppError::NotFound(
            "One or more movies not found".to_string(),
        ));
    }
    Ok(())
}

fn meeting_date(raw: Option<&str>) -> AppResult<Option<DateTime<Utc>>> {
    match raw.map(str::trim).filter(|d| !d.is_empty()) {
        None => Ok(None),
        Some(d) => parse_instant(d)
            .map(Some)
            .ok_or_else(|| AppError::InvalidInput("Invalid meeting date".to_string())),
    }
}

/// `limit` query value, clamped to a sane range
fn suggestion_limit(raw: Option<&str>) -> usize {
    raw.and_then(|l| l.trim().parse::<usize>().ok())
        .filter(|l| *l > 0)
        .map(|l| l.min(MAX_SUGGESTION_LIMIT))
        .unwrap_or(DEFAULT_SUGGESTION_LIMIT)
}

/// GET /api/movie-history
pub async fn list(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
) -> AppResult<Json<Vec<MeetingView>>> {
    let meetings = state.store.list_meetings().await?;
    Ok(Json(meeting_views(state.store.as_ref(), &meetings).await?))
}

/// GET /api/movie-history/:id
pub async fn get(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<MeetingView>> {
    let meeting = find_meeting(&state, id).await?;
    Ok(Json(view(&state, &meeting).await?))
}

/// POST /api/movie-history
///
/// The caller becomes the host. Meetings dated in the future start upcoming.
pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    _: AdminAccess,
    ApiJson(body): ApiJson<CreateMeetingRequest>,
) -> AppResult<(StatusCode, Json<MeetingView>)> {
    let date = meeting_date(body.watched_date.as_deref())?
        .ok_or_else(|| AppError::InvalidInput("Meeting date required".to_string()))?;
    let movie_ids = body.movie_ids.unwrap_or_default();
    ensure_movies_exist(&state, &movie_ids).await?;

    let mut meeting = Meeting::new(date, user.id, movie_ids, Utc::now());
    meeting.location = body.location.filter(|l| !l.trim().is_empty());
    meeting.theme = body.theme.filter(|t| !t.trim().is_empty());
    state.store.create_meeting(&mut meeting).await?;

    tracing::info!(
        meeting_id = %meeting.id,
        watched_date = %meeting.watched_date,
        status = meeting.status.as_str(),
        "Created meeting"
    );
    Ok((StatusCode::CREATED, Json(view(&state, &meeting).await?)))
}

/// PUT /api/movie-history/:id
pub async fn update(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    _: AdminAccess,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateMeetingRequest>,
) -> AppResult<Json<MeetingView>> {
    let mut meeting = find_meeting(&state, id).await?;

    if let Some(movie_ids) = body.movie_ids {
        ensure_movies_exist(&state, &movie_ids).await?;
        meeting.movie_ids = movie_ids;
    }
    if let Some(date) = meeting_date(body.watched_date.as_deref())? {
        meeting.reschedule(date, Utc::now());
    }
    if let Some(location) = body.location {
        meeting.location = Some(location).filter(|l| !l.trim().is_empty());
    }
    if let Some(theme) = body.theme {
        meeting.theme = Some(theme).filter(|t| !t.trim().is_empty());
    }

    state.store.save_meeting(&mut meeting).await?;
    Ok(Json(view(&state, &meeting).await?))
}

/// DELETE /api/movie-history/:id
pub async fn delete(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    _: AdminAccess,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    if !state.store.delete_meeting(id).await? {
        return Err(AppError::NotFound("Meeting not found".to_string()));
    }
    tracing::info!(meeting_id = %id, "Deleted meeting");
    Ok(Json(json!({ "message": "Meeting deleted successfully" })))
}

/// POST /api/movie-history/:id/rating
pub async fn rate(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<RatingRequest>,
) -> AppResult<Json<MeetingView>> {
    let rating = validate_score(body.rating).map_err(AppError::InvalidInput)?;
    let comment = validate_comment(body.comment.as_deref())
        .map_err(AppError::InvalidInput)?
        .to_string();

    let mut meeting = state
        .store
        .find_meeting(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Movie history not found".to_string()))?;

    meeting.upsert_rating(user.id, body.movie_id, rating, comment);
    state.store.save_meeting(&mut meeting).await?;
    tracing::info!(meeting_id = %meeting.id, rating, "Movie rated");

    Ok(Json(view(&state, &meeting).await?))
}

/// POST /api/movie-history/:id/gathering-rating
pub async fn rate_gathering(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<GatheringRatingRequest>,
) -> AppResult<Json<MeetingView>> {
    let rating = validate_score(body.rating).map_err(AppError::InvalidInput)?;

    let mut meeting = state
        .store
        .find_meeting(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Movie history not found".to_string()))?;

    meeting.upsert_gathering_rating(user.id, rating, body.comment);
    state.store.save_meeting(&mut meeting).await?;

    Ok(Json(view(&state, &meeting).await?))
}

/// GET /api/movie-history/reviews/:movieId
pub async fn movie_reviews(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    _: AdminAccess,
    ApiPath(movie_id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    let meetings = state.store.list_meetings().await?;
    let reviewed: Vec<&Meeting> = meetings
        .iter()
        .filter(|m| m.ratings.iter().any(|r| r.movie_id == Some(movie_id)))
        .collect();
    let reviewers = reviewed
        .iter()
        .flat_map(|m| m.ratings.iter().map(|r| r.user_id))
        .collect();
    let lookup = Lookup::load(state.store.as_ref(), reviewers, Vec::new()).await?;

    let reviews: Vec<MovieReview> = reviewed
        .iter()
        .flat_map(|meeting| {
            let lookup = &lookup;
            meeting
                .ratings
                .iter()
                .filter(|r| r.movie_id == Some(movie_id))
                .map(move |r| MovieReview {
                    id: r.id,
                    user: lookup.user(&r.user_id),
                    rating: r.rating,
                    comment: r.comment.clone(),
                    meeting: ReviewMeeting {
                        id: meeting.id,
                        watched_date: meeting.watched_date,
                        location: meeting.location.clone(),
                    },
                })
        })
        .collect();

    Ok(Json(json!({ "reviews": reviews })))
}

/// POST /api/movie-history/:id/suggest
///
/// Members may each propose a limited number of candidates per meeting.
pub async fn suggest(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<SuggestRequest>,
) -> AppResult<Json<SuggestResponse>> {
    let tmdb_id = body
        .tmdb_id
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::InvalidInput("TMDB movie ID required".to_string()))?;

    let mut meeting = find_meeting(&state, id).await?;
    let used = meeting.suggestions_by(&user.id).len();
    if used >= MAX_SUGGESTIONS_PER_USER {
        return Err(AppError::InvalidInput(format!(
            "You have already suggested {} movies for this meeting",
            MAX_SUGGESTIONS_PER_USER
        )));
    }

    let movie = get_or_create_movie(
        state.store.as_ref(),
        state.movies.as_ref(),
        tmdb_id,
        Some(user.id),
    )
    .await?;

    if !meeting.add_candidate(movie.id) {
        return Err(AppError::InvalidInput(
            "This movie is already a candidate".to_string(),
        ));
    }
    meeting.suggestions.push(Suggestion {
        user_id: user.id,
        movie_id: movie.id,
        created_at: Utc::now(),
    });
    state.store.save_meeting(&mut meeting).await?;
    tracing::info!(meeting_id = %meeting.id, movie_id = %movie.id, title = %movie.title, "Movie suggested");

    Ok(Json(SuggestResponse {
        success: true,
        movie: SuggestedMovie {
            id: movie.id,
            title: movie.title,
            poster: movie.poster,
        },
        remaining_suggestions: MAX_SUGGESTIONS_PER_USER - used - 1,
    }))
}

/// GET /api/movie-history/:id/my-suggestions
pub async fn my_suggestions(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    let meeting = find_meeting(&state, id).await?;
    let mine = meeting.suggestions_by(&user.id);

    Ok(Json(json!({
        "count": mine.len(),
        "remaining": MAX_SUGGESTIONS_PER_USER.saturating_sub(mine.len()),
        "suggestions": mine,
    })))
}

/// POST /api/movie-history/:id/candidates
pub async fn add_candidate(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    _: AdminAccess,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<CandidateRequest>,
) -> AppResult<Json<MeetingView>> {
    let movie_id = body
        .movie_id
        .ok_or_else(|| AppError::InvalidInput("Movie ID required".to_string()))?;

    let mut meeting = find_meeting(&state, id).await?;
    if state.store.find_movie(movie_id).await?.is_none() {
        return Err(AppError::NotFound("Movie not found".to_string()));
    }
    if !meeting.add_candidate(movie_id) {
        return Err(AppError::InvalidInput(
            "Movie is already a candidate".to_string(),
        ));
    }
    state.store.save_meeting(&mut meeting).await?;

    Ok(Json(view(&state, &meeting).await?))
}

/// DELETE /api/movie-history/:id/candidates/:movieId
///
/// Votes on the removed candidate are dropped as well.
pub async fn remove_candidate(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    _: AdminAccess,
    ApiPath((id, movie_id)): ApiPath<(Uuid, Uuid)>,
) -> AppResult<Json<MeetingView>> {
    let mut meeting = find_meeting(&state, id).await?;

    meeting.remove_candidate(&movie_id);
    state.store.save_meeting(&mut meeting).await?;
    let dropped = state
        .store
        .delete_meeting_votes_for_movie(meeting.id, movie_id)
        .await?;
    tracing::info!(meeting_id = %meeting.id, movie_id = %movie_id, dropped_votes = dropped, "Removed candidate");

    Ok(Json(view(&state, &meeting).await?))
}

/// GET /api/movie-history/:id/candidates
pub async fn candidates(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<CandidatesResponse>> {
    let meeting = find_meeting(&state, id).await?;
    let votes = state.store.meeting_votes(meeting.id).await?;

    let lookup = Lookup::load(
        state.store.as_ref(),
        votes.iter().map(|v| v.user_id).collect(),
        meeting
            .candidates
            .iter()
            .copied()
            .chain(votes.iter().map(|v| v.movie_id))
            .collect(),
    )
    .await?;

    Ok(Json(CandidatesResponse {
        candidates: lookup.movies(&meeting.candidates),
        votes: votes.iter().map(|v| lookup.meeting_vote(v)).collect(),
    }))
}

/// POST /api/movie-history/:id/vote
pub async fn vote(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<MeetingVoteRequest>,
) -> AppResult<(StatusCode, Json<MeetingVoteView>)> {
    let (Some(movie_id), Some(vote_type)) = (body.movie_id, body.vote_type.as_deref()) else {
        return Err(AppError::InvalidInput(
            "Movie ID and vote type required".to_string(),
        ));
    };
    let vote_type: MeetingVoteType = vote_type
        .parse()
        .map_err(|_| AppError::InvalidInput("Vote type must be \"yes\" or \"no\"".to_string()))?;

    let reason = body.reason.filter(|r| !r.trim().is_empty());
    if reason
        .as_deref()
        .is_some_and(|r| text_len(r) > MAX_VOTE_REASON_CHARS)
    {
        return Err(AppError::InvalidInput(format!(
            "Reason must be at most {} characters",
            MAX_VOTE_REASON_CHARS
        )));
    }

    let meeting = find_meeting(&state, id).await?;
    if !meeting.is_candidate(&movie_id) {
        return Err(AppError::InvalidInput(
            "Movie is not a candidate for this meeting".to_string(),
        ));
    }
    let now = Utc::now();
    if !meeting.accepts_votes(now) {
        return Err(AppError::InvalidInput(
            "Cannot vote on past meetings".to_string(),
        ));
    }

    let vote = MeetingVote {
        id: Uuid::new_v4(),
        user_id: user.id,
        movie_id,
        meeting_id: meeting.id,
        vote_type,
        reason,
        created_at: now,
    };
    state.store.replace_meeting_vote(&vote).await?;
    tracing::info!(meeting_id = %meeting.id, movie_id = %movie_id, vote_type = %vote_type, "Meeting vote cast");

    let lookup = Lookup::load(state.store.as_ref(), vec![user.id], vec![movie_id]).await?;
    Ok((StatusCode::CREATED, Json(lookup.meeting_vote(&vote))))
}

/// GET /api/movie-history/:id/my-votes
pub async fn my_votes(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Vec<MeetingVoteView>>> {
    let votes = state.store.user_meeting_votes(user.id, id).await?;
    let lookup = Lookup::load(
        state.store.as_ref(),
        vec![user.id],
        votes.iter().map(|v| v.movie_id).collect(),
    )
    .await?;
    Ok(Json(votes.iter().map(|v| lookup.meeting_vote(v)).collect()))
}

async fn suggestions_for(
    state: &AppState,
    meeting: &Meeting,
    limit: usize,
) -> AppResult<Vec<AiSuggestion>> {
    generate_suggestions(
        state.store.as_ref(),
        state.movies.as_ref(),
        state.llm()?,
        &state.suggestions,
        meeting,
        limit,
        Utc::now(),
    )
    .await
}

/// POST /api/movie-history/:id/ai-suggestions?limit=
///
/// Suggested movies are added to the meeting's candidates.
pub async fn generate_ai_suggestions(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    _: AdminAccess,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<SuggestionsQuery>,
) -> AppResult<Json<Value>> {
    let mut meeting = find_meeting(&state, id).await?;
    let suggestions =
        suggestions_for(&state, &meeting, suggestion_limit(query.limit.as_deref())).await?;

    let mut added = 0;
    for suggestion in &suggestions {
        if meeting.add_candidate(suggestion.movie_id) {
            added += 1;
        }
    }
    if added > 0 {
        state.store.save_meeting(&mut meeting).await?;
    }
    tracing::info!(meeting_id = %meeting.id, suggestions = suggestions.len(), added, "AI suggestions added as candidates");

    Ok(Json(json!({ "suggestions": suggestions })))
}

/// GET /api/movie-history/:id/ai-suggestions
pub async fn ai_suggestions(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    _: AdminAccess,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    let meeting = find_meeting(&state, id).await?;
    let suggestions = suggestions_for(&state, &meeting, DEFAULT_SUGGESTION_LIMIT).await?;
    Ok(Json(json!({ "suggestions": suggestions })))
}

/// POST /api/movie-history/:id/ai-recommendation
///
/// Never cached; always reflects the current votes.
pub async fn ai_recommendation(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    _: AdminAccess,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    let llm = state.llm()?;
    let meeting = find_meeting(&state, id).await?;
    let votes = state.store.meeting_votes(meeting.id).await?;

    let lookup = Lookup::load(
        state.store.as_ref(),
        votes.iter().map(|v| v.user_id).collect(),
        meeting.candidates.clone(),
    )
    .await?;
    let candidates = lookup.movies(&meeting.candidates);

    let recommendation: Recommendation = recommend_candidate(
        llm,
        &candidates,
        &votes,
        lookup.users(),
        meeting.theme.as_deref(),
    )
    .await?;

    Ok(Json(json!({ "recommendation": recommendation })))
}
