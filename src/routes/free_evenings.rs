use axum::{extract::State, http::StatusCode, Json};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{collections::HashSet, sync::Arc};

use crate::{
    error::{AppError, AppResult},
    extract::ApiJson,
    middleware::AuthUser,
    models::{FreeEvening, FreeEveningView, UpcomingWeek, WeekDay},
    services::{
        calendar::{parse_day, start_of_day, UpcomingWeekRange},
        Lookup,
    },
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct DateRequest {
    #[serde(default)]
    date: Option<String>,
}

fn this_week() -> UpcomingWeekRange {
    UpcomingWeekRange::starting_after(Utc::now().date_naive())
}

fn requested_day(body: &DateRequest) -> AppResult<NaiveDate> {
    let raw = body
        .date
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| AppError::InvalidInput("Date required".to_string()))?;
    parse_day(raw).ok_or_else(|| AppError::InvalidInput("Invalid date".to_string()))
}

/// GET /api/free-evenings/upcoming-week
pub async fn upcoming_week(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
) -> AppResult<Json<UpcomingWeek>> {
    let week = this_week();
    let (from, until) = week.instants();

    let meeting_days: HashSet<NaiveDate> = state
        .store
        .meetings_between(from, until)
        .await?
        .iter()
        .map(|m| m.watched_date.date_naive())
        .collect();

    let evenings = state
        .store
        .free_evenings_between(week.start, week.end)
        .await?;
    let lookup = Lookup::load(
        state.store.as_ref(),
        evenings.iter().map(|e| e.user_id).collect(),
        Vec::new(),
    )
    .await?;

    let dates = week
        .days()
        .map(|day| WeekDay {
            date: day,
            has_meeting: meeting_days.contains(&day),
            free_users: evenings
                .iter()
                .filter(|e| e.date == day)
                .map(|e| lookup.free_evening(e))
                .collect(),
        })
        .collect();

    Ok(Json(UpcomingWeek {
        week_start: week.start,
        week_end: week.end,
        dates,
    }))
}

/// POST /api/free-evenings
pub async fn mark(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiJson(body): ApiJson<DateRequest>,
) -> AppResult<(StatusCode, Json<FreeEveningView>)> {
    let day = requested_day(&body)?;

    if !this_week().contains(day) {
        return Err(AppError::InvalidInput(
            "Date must be in the upcoming week".to_string(),
        ));
    }

    let next_day = day.succ_opt().unwrap_or(day);
    let clashing = state
        .store
        .meetings_between(start_of_day(day), start_of_day(next_day))
        .await?;
    if !clashing.is_empty() {
        return Err(AppError::InvalidInput(
            "A meeting is already scheduled for this date".to_string(),
        ));
    }

    let evening = FreeEvening::new(user.id, day);
    state.store.insert_free_evening(&evening).await?;
    tracing::info!(user_id = %user.id, date = %day, "Free evening marked");

    let lookup = Lookup::load(state.store.as_ref(), vec![user.id], Vec::new()).await?;
    Ok((StatusCode::CREATED, Json(lookup.free_evening(&evening))))
}

/// DELETE /api/free-evenings
pub async fn unmark(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiJson(body): ApiJson<DateRequest>,
) -> AppResult<Json<Value>> {
    let day = requested_day(&body)?;

    if !state.store.delete_free_evening(user.id, day).await? {
        return Err(AppError::NotFound("Free evening not found".to_string()));
    }
    Ok(Json(json!({ "message": "Free evening removed successfully" })))
}

/// GET /api/free-evenings/my-free-evenings
pub async fn mine(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Value>> {
    let week = this_week();
    let evenings = state
        .store
        .user_free_evenings_between(user.id, week.start, week.end)
        .await?;
    let dates: Vec<NaiveDate> = evenings.iter().map(|e| e.date).collect();
    Ok(Json(json!({ "dates": dates })))
}
