use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    extract::{ApiJson, ApiPath},
    middleware::{has_admin_access, AuthUser},
    models::{Item, ItemView, Meeting, User},
    services::Lookup,
    state::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    #[serde(default)]
    event_id: Option<Uuid>,
    #[serde(default)]
    name: Option<String>,
}

async fn item_view(state: &AppState, item: &Item) -> AppResult<ItemView> {
    let lookup = Lookup::load(
        state.store.as_ref(),
        item.claimed_by.into_iter().collect(),
        Vec::new(),
    )
    .await?;
    Ok(lookup.item(item))
}

async fn find_item_with_event(state: &AppState, id: Uuid) -> AppResult<(Item, Meeting)> {
    let item = state
        .store
        .find_item(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Item not found".to_string()))?;
    let event = state
        .store
        .find_meeting(item.event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    Ok((item, event))
}

fn can_manage(state: &AppState, headers: &HeaderMap, user: &User, event: &Meeting) -> bool {
    event.host_id == user.id || has_admin_access(state, headers, user)
}

/// GET /api/items/event/:eventId
pub async fn for_event(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
    ApiPath(event_id): ApiPath<Uuid>,
) -> AppResult<Json<Vec<ItemView>>> {
    let items = state.store.items_for_event(event_id).await?;
    let lookup = Lookup::load(
        state.store.as_ref(),
        items.iter().filter_map(|i| i.claimed_by).collect(),
        Vec::new(),
    )
    .await?;
    Ok(Json(items.iter().map(|i| lookup.item(i)).collect()))
}

/// POST /api/items
///
/// Only the host or an admin may add items, and only to future events.
pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    headers: HeaderMap,
    ApiJson(body): ApiJson<CreateItemRequest>,
) -> AppResult<(StatusCode, Json<ItemView>)> {
    let name = body.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let (Some(event_id), Some(name)) = (body.event_id, name) else {
        return Err(AppError::InvalidInput(
            "Event ID and name required".to_string(),
        ));
    };

    let event = state
        .store
        .find_meeting(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    if !event.is_future(Utc::now()) {
        return Err(AppError::InvalidInput(
            "Items can only be added to future events".to_string(),
        ));
    }
    if !can_manage(&state, &headers, &user, &event) {
        return Err(AppError::Forbidden(
            "Only host or admin can add items".to_string(),
        ));
    }

    let item = Item::new(event.id, name);
    state.store.insert_item(&item).await?;
    tracing::info!(item_id = %item.id, event_id = %event.id, name = %item.name, "Created item");

    Ok((StatusCode::CREATED, Json(item_view(&state, &item).await?)))
}

/// PUT /api/items/:id/claim
///
/// Claims an available item or releases the caller's own claim.
pub async fn toggle_claim(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<ItemView>> {
    let (mut item, event) = find_item_with_event(&state, id).await?;

    let now = Utc::now();
    if !event.is_future(now) {
        return Err(AppError::InvalidInput(
            "Items can only be claimed for future events".to_string(),
        ));
    }

    let holds_other = state
        .store
        .claimed_item(event.id, user.id)
        .await?
        .is_some_and(|held| held.id != item.id);

    let change = item
        .toggle_claim(user.id, holds_other, now)
        .map_err(|e| AppError::InvalidInput(e.message().to_string()))?;
    state.store.update_item(&item).await?;
    tracing::info!(item_id = %item.id, event_id = %event.id, change = ?change, "Item claim toggled");

    Ok(Json(item_view(&state, &item).await?))
}

/// DELETE /api/items/:id
pub async fn delete(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    headers: HeaderMap,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    let (item, event) = find_item_with_event(&state, id).await?;

    if !event.is_future(Utc::now()) {
        return Err(AppError::InvalidInput(
            "Items can only be deleted from future events".to_string(),
        ));
    }
    if !can_manage(&state, &headers, &user, &event) {
        return Err(AppError::Forbidden(
            "Only host or admin can delete items".to_string(),
        ));
    }

    state.store.delete_item(item.id).await?;
    tracing::info!(item_id = %item.id, event_id = %event.id, "Deleted item");
    Ok(Json(json!({ "message": "Item deleted" })))
}
