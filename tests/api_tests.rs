use std::sync::{Arc, Mutex};

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::{TestRequest, TestServer};
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use movie_night_api::{
    create_router,
    db::{MemoryStore, Store},
    error::{AppError, AppResult},
    models::{Movie, MovieDetails, MovieSearchPage, MovieSearchResult},
    services::{calendar::UpcomingWeekRange, AuthSettings, ChatCompletion, MovieProvider},
    AppState,
};

const ADMIN_PASSWORD: &str = "letmein";
const PATTERN: &str = "1-5-9-6";
const LONG_COMMENT: &str =
    "A slow burn that rewards patience, with a final act that lands every beat it set up.";

/// Every search hit is derived from the query so lookups stay deterministic
struct FakeMovies;

fn tmdb_id_for(title: &str) -> i64 {
    title.bytes().map(i64::from).sum::<i64>() + title.len() as i64 * 1000
}

fn details(tmdb_id: i64, title: &str) -> MovieDetails {
    MovieDetails {
        tmdb_id,
        title: title.to_string(),
        poster: format!("https://image.tmdb.org/t/p/w500/{}.jpg", tmdb_id),
        trailer: None,
        description: format!("About {}", title),
        genres: vec!["Drama".to_string()],
        release_date: None,
        runtime: Some(110),
    }
}

#[async_trait::async_trait]
impl MovieProvider for FakeMovies {
    async fn search(&self, query: &str, page: u32) -> AppResult<MovieSearchPage> {
        Ok(MovieSearchPage {
            results: vec![MovieSearchResult {
                id: tmdb_id_for(query),
                title: query.to_string(),
                overview: String::new(),
                poster: None,
                release_date: None,
                genre_ids: vec![18],
            }],
            total_results: 1,
            total_pages: 1,
            page,
        })
    }

    async fn details(&self, tmdb_id: i64) -> AppResult<MovieDetails> {
        if tmdb_id <= 0 {
            return Err(AppError::NotFound("Movie not found on TMDB".to_string()));
        }
        Ok(details(tmdb_id, &format!("Movie {}", tmdb_id)))
    }
}

/// Answers with a fixed body and remembers every prompt it was sent
struct FakeLlm {
    response: String,
    prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    fn new(response: Value) -> Self {
        Self {
            response: response.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ChatCompletion for FakeLlm {
    async fn complete(&self, _system: &str, user: &str, _max_tokens: u32) -> AppResult<String> {
        self.prompts.lock().unwrap().push(user.to_string());
        Ok(self.response.clone())
    }
}

struct TestApp {
    server: TestServer,
    store: Arc<MemoryStore>,
}

fn build_app(llm: Option<Arc<FakeLlm>>, admin_password: Option<&str>) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(
        store.clone(),
        Arc::new(FakeMovies),
        llm.map(|l| l as Arc<dyn ChatCompletion>),
        AuthSettings::new("test-secret", 4),
        admin_password.map(str::to_string),
    );
    let server = TestServer::new(create_router(Arc::new(state))).unwrap();
    TestApp { server, store }
}

fn create_test_app() -> TestApp {
    build_app(None, Some(ADMIN_PASSWORD))
}

fn bearer(request: TestRequest, token: &str) -> TestRequest {
    request.add_header(
        HeaderName::from_static("authorization"),
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    )
}

fn admin(request: TestRequest) -> TestRequest {
    request.add_header(
        HeaderName::from_static("x-admin-password"),
        HeaderValue::from_static(ADMIN_PASSWORD),
    )
}

impl TestApp {
    /// Creates the account through the admin API and sets its pattern
    async fn sign_up(&self, username: &str) -> String {
        admin(self.server.post("/api/admin/users"))
            .json(&json!({ "username": username }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = self
            .server
            .post("/api/auth/set-pattern")
            .json(&json!({
                "username": username,
                "pattern": PATTERN,
                "confirmPattern": PATTERN,
            }))
            .await;
        response.assert_status_ok();
        response.json::<Value>()["token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    async fn stored_movie(&self, title: &str) -> Movie {
        let movie = Movie::from_details(details(tmdb_id_for(title), title), None);
        self.store.insert_movie(&movie).await.unwrap().0
    }

    async fn create_cycle(
        &self,
        token: &str,
        start: chrono::DateTime<Utc>,
        end: chrono::DateTime<Utc>,
        movie_ids: &[uuid::Uuid],
    ) -> String {
        let response = admin(bearer(self.server.post("/api/cycles"), token))
            .json(&json!({
                "startDate": start.to_rfc3339(),
                "endDate": end.to_rfc3339(),
                "movieIds": movie_ids,
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["id"].as_str().unwrap().to_string()
    }

    async fn add_candidate(&self, token: &str, meeting_id: &str, movie_id: uuid::Uuid) {
        admin(bearer(
            self.server
                .post(&format!("/api/movie-history/{}/candidates", meeting_id)),
            token,
        ))
        .json(&json!({ "movieId": movie_id }))
        .await
        .assert_status_ok();
    }

    async fn create_meeting(&self, token: &str, watched_date: chrono::DateTime<Utc>) -> Value {
        let response = admin(bearer(self.server.post("/api/movie-history"), token))
            .json(&json!({ "watchedDate": watched_date.to_rfc3339() }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app();
    let response = app.server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_pattern_login_flow() {
    let app = create_test_app();
    admin(app.server.post("/api/admin/users"))
        .json(&json!({ "username": "Ana" }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = app
        .server
        .post("/api/auth/check-username")
        .json(&json!({ "username": "ana" }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["hasPattern"], false);

    app.server
        .post("/api/auth/set-pattern")
        .json(&json!({ "username": "Ana", "pattern": PATTERN, "confirmPattern": "1-2-3-4" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let response = app
        .server
        .post("/api/auth/set-pattern")
        .json(&json!({ "username": "Ana", "pattern": "1-2-3", "confirmPattern": "1-2-3" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"],
        "Invalid pattern. Must connect at least 4 dots."
    );

    let response = app
        .server
        .post("/api/auth/set-pattern")
        .json(&json!({
            "username": "Ana",
            "pattern": PATTERN,
            "confirmPattern": PATTERN,
            "displayName": "Ana B",
        }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["user"]["displayName"], "Ana B");
    assert_eq!(body["user"]["needsOnboarding"], true);

    app.server
        .post("/api/auth/set-pattern")
        .json(&json!({ "username": "Ana", "pattern": PATTERN, "confirmPattern": PATTERN }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    app.server
        .post("/api/auth/login")
        .json(&json!({ "username": "ana", "pattern": "9-8-7-6" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let response = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "username": "ana", "pattern": PATTERN }))
        .await;
    response.assert_status_ok();
    let token = response.json::<Value>()["token"].as_str().unwrap().to_string();

    let response = bearer(app.server.get("/api/auth/me"), &token).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["username"], "Ana");
}

#[tokio::test]
async fn test_bearer_auth_errors() {
    let app = create_test_app();

    let response = app.server.get("/api/auth/me").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["error"], "No token provided");

    let response = bearer(app.server.get("/api/auth/me"), "not-a-token").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["error"], "Invalid token");
}

#[tokio::test]
async fn test_admin_password_checks() {
    let app = create_test_app();

    let response = app
        .server
        .post("/api/admin/users")
        .json(&json!({ "username": "mallory" }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(response.json::<Value>()["error"], "Invalid admin password");

    app.server
        .post("/api/admin/verify-password")
        .json(&json!({ "password": "guess" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    app.server
        .post("/api/admin/verify-password")
        .json(&json!({ "password": ADMIN_PASSWORD }))
        .await
        .assert_status_ok();

    let unconfigured = build_app(None, None);
    let response = unconfigured
        .server
        .post("/api/admin/verify-password")
        .json(&json!({ "password": ADMIN_PASSWORD }))
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.json::<Value>()["error"],
        "Admin password not configured"
    );
}

#[tokio::test]
async fn test_second_cycle_vote_supersedes_first() {
    let app = create_test_app();
    let token = app.sign_up("ana").await;
    let movie = app.stored_movie("Heat").await;
    let now = Utc::now();

    let response = admin(bearer(app.server.post("/api/cycles"), &token))
        .json(&json!({
            "startDate": (now - Duration::days(1)).to_rfc3339(),
            "endDate": (now + Duration::days(1)).to_rfc3339(),
            "movieIds": [movie.id],
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let cycle_id = response.json::<Value>()["id"].as_str().unwrap().to_string();

    for vote_type in ["like", "dislike"] {
        bearer(app.server.post("/api/votes"), &token)
            .json(&json!({ "movieId": movie.id, "cycleId": cycle_id, "voteType": vote_type }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let response = bearer(app.server.get(&format!("/api/votes/cycle/{}", cycle_id)), &token).await;
    response.assert_status_ok();
    let votes: Vec<Value> = response.json();
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0]["voteType"], "dislike");
}

#[tokio::test]
async fn test_activating_cycle_deactivates_others() {
    let app = create_test_app();
    let token = app.sign_up("ana").await;
    let movie = app.stored_movie("Alien").await;
    let now = Utc::now();

    let mut ids = Vec::new();
    for _ in 0..2 {
        let response = admin(bearer(app.server.post("/api/cycles"), &token))
            .json(&json!({
                "startDate": now.to_rfc3339(),
                "endDate": (now + Duration::days(3)).to_rfc3339(),
                "movieIds": [movie.id],
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        ids.push(response.json::<Value>()["id"].as_str().unwrap().to_string());
    }

    let response = bearer(app.server.get("/api/cycles/active"), &token).await;
    assert_eq!(response.json::<Value>()["id"], ids[1]);

    admin(bearer(app.server.put(&format!("/api/cycles/{}", ids[0])), &token))
        .json(&json!({ "isActive": true }))
        .await
        .assert_status_ok();

    let cycles: Vec<Value> = bearer(app.server.get("/api/cycles"), &token).await.json();
    let active: Vec<&Value> = cycles.iter().filter(|c| c["isActive"] == true).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["id"], ids[0]);
}

#[tokio::test]
async fn test_invalid_cycle_update_keeps_active_cycle() {
    let app = create_test_app();
    let token = app.sign_up("ana").await;
    let movie = app.stored_movie("Alien").await;
    let now = Utc::now();

    let first = app
        .create_cycle(&token, now, now + Duration::days(3), &[movie.id])
        .await;
    let second = app
        .create_cycle(&token, now, now + Duration::days(3), &[movie.id])
        .await;

    let response = admin(bearer(app.server.put(&format!("/api/cycles/{}", first)), &token))
        .json(&json!({ "isActive": true, "startDate": "garbage" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "Invalid start date");

    let response = bearer(app.server.get("/api/cycles/active"), &token).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["id"], second);

    let cycles: Vec<Value> = bearer(app.server.get("/api/cycles"), &token).await.json();
    let active: Vec<&Value> = cycles.iter().filter(|c| c["isActive"] == true).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["id"], second);
}

#[tokio::test]
async fn test_cycle_vote_requires_open_active_cycle() {
    let app = create_test_app();
    let token = app.sign_up("ana").await;
    let movie = app.stored_movie("Heat").await;
    let now = Utc::now();

    let replaced = app
        .create_cycle(&token, now - Duration::days(1), now + Duration::days(1), &[movie.id])
        .await;
    app.create_cycle(&token, now - Duration::days(1), now + Duration::days(1), &[movie.id])
        .await;

    let response = bearer(app.server.post("/api/votes"), &token)
        .json(&json!({ "movieId": movie.id, "cycleId": replaced, "voteType": "like" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "Cycle is not active");

    let upcoming = app
        .create_cycle(&token, now + Duration::days(2), now + Duration::days(5), &[movie.id])
        .await;
    let response = bearer(app.server.post("/api/votes"), &token)
        .json(&json!({ "movieId": movie.id, "cycleId": upcoming, "voteType": "like" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"],
        "Voting period has not started or has ended"
    );
}

#[tokio::test]
async fn test_short_rating_comment_rejected() {
    let app = create_test_app();
    let token = app.sign_up("ana").await;
    let meeting = app.create_meeting(&token, Utc::now() - Duration::days(2)).await;
    let url = format!("/api/movie-history/{}/rating", meeting["id"].as_str().unwrap());

    let response = bearer(app.server.post(&url), &token)
        .json(&json!({ "rating": 4, "comment": "Loved it" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"],
        "Comment must be at least 50 characters"
    );

    let response = bearer(app.server.post(&url), &token)
        .json(&json!({ "rating": 4, "comment": LONG_COMMENT }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["averageRating"], 4.0);
    assert_eq!(body["ratings"][0]["user"]["username"], "ana");
}

#[tokio::test]
async fn test_item_claim_lifecycle() {
    let app = create_test_app();
    let host = app.sign_up("host").await;
    let guest = app.sign_up("guest").await;
    let other = app.sign_up("other").await;
    let meeting = app.create_meeting(&host, Utc::now() + Duration::days(3)).await;

    let response = bearer(app.server.post("/api/items"), &guest)
        .json(&json!({ "eventId": meeting["id"], "name": "Popcorn" }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = bearer(app.server.post("/api/items"), &host)
        .json(&json!({ "eventId": meeting["id"], "name": "Popcorn" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let item_id = response.json::<Value>()["id"].as_str().unwrap().to_string();
    let claim_url = format!("/api/items/{}/claim", item_id);

    let response = bearer(app.server.put(&claim_url), &guest).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "claimed");
    assert_eq!(body["claimedBy"]["username"], "guest");

    let response = bearer(app.server.put(&claim_url), &other).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"],
        "Item already claimed by someone else"
    );

    let response = bearer(app.server.put(&claim_url), &guest).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "available");
    assert!(body["claimedBy"].is_null());
}

#[tokio::test]
async fn test_free_evening_on_meeting_date_rejected() {
    let app = create_test_app();
    let token = app.sign_up("ana").await;
    let week = UpcomingWeekRange::starting_after(Utc::now().date_naive());

    let meeting_day = week.start + Duration::days(2);
    let meeting_time = meeting_day
        .and_hms_opt(19, 30, 0)
        .unwrap()
        .and_utc();
    app.create_meeting(&token, meeting_time).await;

    let response = bearer(app.server.post("/api/free-evenings"), &token)
        .json(&json!({ "date": meeting_day.to_string() }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"],
        "A meeting is already scheduled for this date"
    );

    let free_day = week.start + Duration::days(4);
    bearer(app.server.post("/api/free-evenings"), &token)
        .json(&json!({ "date": free_day.to_string() }))
        .await
        .assert_status(StatusCode::CREATED);
    bearer(app.server.post("/api/free-evenings"), &token)
        .json(&json!({ "date": free_day.to_string() }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let outside = week.end + Duration::days(1);
    bearer(app.server.post("/api/free-evenings"), &token)
        .json(&json!({ "date": outside.to_string() }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let week_view: Value = bearer(app.server.get("/api/free-evenings/upcoming-week"), &token)
        .await
        .json();
    let dates = week_view["dates"].as_array().unwrap();
    assert_eq!(dates.len(), 7);
    assert_eq!(dates[2]["hasMeeting"], true);
    assert_eq!(dates[4]["freeUsers"][0]["user"]["username"], "ana");
}

#[tokio::test]
async fn test_ai_suggestions_cold_start() {
    let llm = Arc::new(FakeLlm::new(json!({
        "movies": [
            { "title": "Paddington 2", "reason": "Warm and funny." },
            { "title": "Parasite", "reason": "Sharp and tense." }
        ]
    })));
    let app = build_app(Some(llm.clone()), Some(ADMIN_PASSWORD));
    let token = app.sign_up("ana").await;
    let meeting = app.create_meeting(&token, Utc::now() + Duration::days(5)).await;
    let meeting_id = meeting["id"].as_str().unwrap();

    let response = admin(bearer(
        app.server
            .post(&format!("/api/movie-history/{}/ai-suggestions", meeting_id)),
        &token,
    ))
    .await;
    response.assert_status_ok();
    let suggestions = response.json::<Value>()["suggestions"]
        .as_array()
        .unwrap()
        .clone();
    assert_eq!(suggestions.len(), 2);
    assert_eq!(suggestions[0]["reason"], "Warm and funny.");

    let prompts = llm.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("no viewing history yet"));

    let candidates: Value = bearer(
        app.server
            .get(&format!("/api/movie-history/{}/candidates", meeting_id)),
        &token,
    )
    .await
    .json();
    assert_eq!(candidates["candidates"].as_array().unwrap().len(), 2);

    // a second request within the hour reuses the cached list
    admin(bearer(
        app.server
            .get(&format!("/api/movie-history/{}/ai-suggestions", meeting_id)),
        &token,
    ))
    .await
    .assert_status_ok();
    assert_eq!(llm.prompts().len(), 1);
}

#[tokio::test]
async fn test_ai_endpoints_unavailable_without_llm() {
    let app = create_test_app();
    let token = app.sign_up("ana").await;
    let meeting = app.create_meeting(&token, Utc::now() + Duration::days(5)).await;

    admin(bearer(
        app.server.post(&format!(
            "/api/movie-history/{}/ai-suggestions",
            meeting["id"].as_str().unwrap()
        )),
        &token,
    ))
    .await
    .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_meeting_vote_replaces_previous() {
    let app = create_test_app();
    let token = app.sign_up("ana").await;
    let meeting = app.create_meeting(&token, Utc::now() + Duration::days(5)).await;
    let meeting_id = meeting["id"].as_str().unwrap();

    let response = bearer(
        app.server
            .post(&format!("/api/movie-history/{}/suggest", meeting_id)),
        &token,
    )
    .json(&json!({ "tmdbId": 603 }))
    .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["remainingSuggestions"], 1);
    let movie_id = body["movie"]["id"].clone();

    let vote_url = format!("/api/movie-history/{}/vote", meeting_id);
    bearer(app.server.post(&vote_url), &token)
        .json(&json!({ "movieId": movie_id, "voteType": "yes" }))
        .await
        .assert_status(StatusCode::CREATED);
    bearer(app.server.post(&vote_url), &token)
        .json(&json!({ "movieId": movie_id, "voteType": "no", "reason": "Seen it twice" }))
        .await
        .assert_status(StatusCode::CREATED);

    let votes: Vec<Value> = bearer(
        app.server
            .get(&format!("/api/movie-history/{}/my-votes", meeting_id)),
        &token,
    )
    .await
    .json();
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0]["voteType"], "no");
    assert_eq!(votes[0]["reason"], "Seen it twice");
}

#[tokio::test]
async fn test_third_suggestion_rejected() {
    let app = create_test_app();
    let token = app.sign_up("ana").await;
    let meeting = app.create_meeting(&token, Utc::now() + Duration::days(5)).await;
    let url = format!("/api/movie-history/{}/suggest", meeting["id"].as_str().unwrap());

    for tmdb_id in [603, 604] {
        bearer(app.server.post(&url), &token)
            .json(&json!({ "tmdbId": tmdb_id }))
            .await
            .assert_status_ok();
    }

    let response = bearer(app.server.post(&url), &token)
        .json(&json!({ "tmdbId": 605 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"],
        "You have already suggested 2 movies for this meeting"
    );
}

#[tokio::test]
async fn test_meeting_vote_reason_length_and_date_checks() {
    let app = create_test_app();
    let token = app.sign_up("ana").await;
    let movie = app.stored_movie("Heat").await;

    let upcoming = app.create_meeting(&token, Utc::now() + Duration::days(5)).await;
    let upcoming_id = upcoming["id"].as_str().unwrap();
    app.add_candidate(&token, upcoming_id, movie.id).await;
    let vote_url = format!("/api/movie-history/{}/vote", upcoming_id);

    let response = bearer(app.server.post(&vote_url), &token)
        .json(&json!({ "movieId": movie.id, "voteType": "no", "reason": "x".repeat(501) }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"],
        "Reason must be at most 500 characters"
    );

    bearer(app.server.post(&vote_url), &token)
        .json(&json!({ "movieId": movie.id, "voteType": "no", "reason": "x".repeat(500) }))
        .await
        .assert_status(StatusCode::CREATED);

    let past = app.create_meeting(&token, Utc::now() - Duration::days(2)).await;
    let past_id = past["id"].as_str().unwrap();
    app.add_candidate(&token, past_id, movie.id).await;

    let response = bearer(
        app.server
            .post(&format!("/api/movie-history/{}/vote", past_id)),
        &token,
    )
    .json(&json!({ "movieId": movie.id, "voteType": "yes" }))
    .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"],
        "Cannot vote on past meetings"
    );
}

#[tokio::test]
async fn test_ai_recommendation_prefers_title_named_in_reason() {
    let llm = Arc::new(FakeLlm::new(json!({
        "recommendedMovie": "Heat",
        "reason": "Therefore, I recommend \"Ronin\" for tonight."
    })));
    let app = build_app(Some(llm.clone()), Some(ADMIN_PASSWORD));
    let token = app.sign_up("ana").await;
    let heat = app.stored_movie("Heat").await;
    let ronin = app.stored_movie("Ronin").await;
    let meeting = app.create_meeting(&token, Utc::now() + Duration::days(5)).await;
    let meeting_id = meeting["id"].as_str().unwrap();
    app.add_candidate(&token, meeting_id, heat.id).await;
    app.add_candidate(&token, meeting_id, ronin.id).await;

    let recommendation_url = format!("/api/movie-history/{}/ai-recommendation", meeting_id);
    let response = admin(bearer(app.server.post(&recommendation_url), &token)).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"],
        "No votes available yet. Need votes to generate recommendation."
    );
    assert!(llm.prompts().is_empty());

    let vote_url = format!("/api/movie-history/{}/vote", meeting_id);
    for movie in [&heat, &ronin] {
        bearer(app.server.post(&vote_url), &token)
            .json(&json!({ "movieId": movie.id, "voteType": "yes" }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let response = admin(bearer(app.server.post(&recommendation_url), &token)).await;
    response.assert_status_ok();
    let recommendation = &response.json::<Value>()["recommendation"];
    assert_eq!(recommendation["title"], "Ronin");
    assert_eq!(recommendation["movieId"], json!(ronin.id));
    assert_eq!(llm.prompts().len(), 1);
}

#[tokio::test]
async fn test_second_item_claim_rejected() {
    let app = create_test_app();
    let host = app.sign_up("host").await;
    let guest = app.sign_up("guest").await;
    let meeting = app.create_meeting(&host, Utc::now() + Duration::days(3)).await;

    let mut item_ids = Vec::new();
    for name in ["Popcorn", "Lemonade"] {
        let response = bearer(app.server.post("/api/items"), &host)
            .json(&json!({ "eventId": meeting["id"], "name": name }))
            .await;
        response.assert_status(StatusCode::CREATED);
        item_ids.push(response.json::<Value>()["id"].as_str().unwrap().to_string());
    }

    bearer(app.server.put(&format!("/api/items/{}/claim", item_ids[0])), &guest)
        .await
        .assert_status_ok();

    let response = bearer(app.server.put(&format!("/api/items/{}/claim", item_ids[1])), &guest).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"],
        "You can only claim one item per event"
    );

    let items: Vec<Value> = bearer(
        app.server
            .get(&format!("/api/items/event/{}", meeting["id"].as_str().unwrap())),
        &guest,
    )
    .await
    .json();
    let claimed = items.iter().filter(|i| i["status"] == "claimed").count();
    assert_eq!(claimed, 1);
}

#[tokio::test]
async fn test_removing_candidate_drops_its_votes() {
    let app = create_test_app();
    let token = app.sign_up("ana").await;
    let meeting = app.create_meeting(&token, Utc::now() + Duration::days(5)).await;
    let meeting_id = meeting["id"].as_str().unwrap();

    let response = bearer(
        app.server
            .post(&format!("/api/movie-history/{}/suggest", meeting_id)),
        &token,
    )
    .json(&json!({ "tmdbId": 603 }))
    .await;
    response.assert_status_ok();
    let movie_id = response.json::<Value>()["movie"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    bearer(
        app.server
            .post(&format!("/api/movie-history/{}/vote", meeting_id)),
        &token,
    )
    .json(&json!({ "movieId": movie_id, "voteType": "yes" }))
    .await
    .assert_status(StatusCode::CREATED);

    let candidates_url = format!("/api/movie-history/{}/candidates", meeting_id);
    let before: Value = bearer(app.server.get(&candidates_url), &token).await.json();
    assert_eq!(before["votes"].as_array().unwrap().len(), 1);

    admin(bearer(
        app.server
            .delete(&format!("{}/{}", candidates_url, movie_id)),
        &token,
    ))
    .await
    .assert_status_ok();

    let after: Value = bearer(app.server.get(&candidates_url), &token).await.json();
    assert!(after["candidates"].as_array().unwrap().is_empty());
    assert!(after["votes"].as_array().unwrap().is_empty());
}
