use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    middleware::{make_span_with_request_id, request_id_middleware, ADMIN_PASSWORD_HEADER},
    state::AppState,
};

pub mod admin;
pub mod auth;
pub mod cycles;
pub mod free_evenings;
pub mod items;
pub mod meetings;
pub mod movies;
pub mod votes;

/// Creates the application router with all routes
///
/// The request id is assigned before the trace span is opened so every log
/// line of a request carries it.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id)),
        )
}

/// Allows the configured frontend origin with credentials
pub fn cors_layer(frontend_url: &str) -> anyhow::Result<CorsLayer> {
    let origin = HeaderValue::from_str(frontend_url)
        .map_err(|e| anyhow::anyhow!("Invalid FRONTEND_URL {}: {}", frontend_url, e))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static(ADMIN_PASSWORD_HEADER),
        ]))
}

/// API routes under /api
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/admin", admin_routes())
        .nest("/movies", movie_routes())
        .nest("/cycles", cycle_routes())
        .nest("/votes", vote_routes())
        .nest("/movie-history", meeting_routes())
        .nest("/items", item_routes())
        .nest("/free-evenings", free_evening_routes())
}

fn auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/check-username", post(auth::check_username))
        .route("/set-pattern", post(auth::set_pattern))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/avatar", put(auth::update_avatar))
        .route("/preferences", put(auth::update_preferences))
        .route("/users", get(auth::list_members))
}

fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/verify-password", post(admin::verify_password))
        .route("/users", post(admin::create_user).get(admin::list_users))
        .route("/users/:id/reset-pattern", post(admin::reset_pattern))
        .route("/users/:id", delete(admin::delete_user))
}

fn movie_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(movies::list).post(movies::add))
        .route("/search", get(movies::search))
        .route("/tmdb/:tmdb_id", get(movies::tmdb_details))
        .route("/:id", get(movies::get))
}

fn cycle_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(cycles::list).post(cycles::create))
        .route("/active", get(cycles::active))
        .route("/:id", put(cycles::update))
        .route("/:id/close", post(cycles::close))
}

fn vote_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(votes::cast))
        .route("/cycle/:cycle_id", get(votes::my_cycle_votes))
}

fn meeting_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(meetings::list).post(meetings::create))
        .route("/reviews/:movie_id", get(meetings::movie_reviews))
        .route(
            "/:id",
            get(meetings::get)
                .put(meetings::update)
                .delete(meetings::delete),
        )
        .route("/:id/rating", post(meetings::rate))
        .route("/:id/gathering-rating", post(meetings::rate_gathering))
        .route("/:id/suggest", post(meetings::suggest))
        .route("/:id/my-suggestions", get(meetings::my_suggestions))
        .route(
            "/:id/candidates",
            get(meetings::candidates).post(meetings::add_candidate),
        )
        .route(
            "/:id/candidates/:movie_id",
            delete(meetings::remove_candidate),
        )
        .route("/:id/vote", post(meetings::vote))
        .route("/:id/my-votes", get(meetings::my_votes))
        .route(
            "/:id/ai-suggestions",
            get(meetings::ai_suggestions).post(meetings::generate_ai_suggestions),
        )
        .route("/:id/ai-recommendation", post(meetings::ai_recommendation))
}

fn item_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(items::create))
        .route("/event/:event_id", get(items::for_event))
        .route("/:id/claim", put(items::toggle_claim))
        .route("/:id", delete(items::delete))
}

fn free_evening_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(free_evenings::mark).delete(free_evenings::unmark))
        .route("/upcoming-week", get(free_evenings::upcoming_week))
        .route("/my-free-evenings", get(free_evenings::mine))
}

/// Health check endpoint; 503 when the store cannot be reached
async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let timestamp = chrono::Utc::now().to_rfc3339();
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "timestamp": timestamp, "database": "connected" })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "error", "timestamp": timestamp, "database": "disconnected" })),
            )
        }
    }
}
