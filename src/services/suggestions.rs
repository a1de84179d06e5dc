use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    db::Store,
    error::{AppError, AppResult},
    models::{Meeting, MeetingVote, MeetingVoteType, Movie},
    services::{
        llm::{ChatCompletion, SYSTEM_PROMPT},
        tmdb::MovieProvider,
    },
};

pub const DEFAULT_SUGGESTION_LIMIT: usize = 7;
pub const MAX_SUGGESTION_LIMIT: usize = 20;

const SUGGESTION_TTL: Duration = Duration::from_secs(60 * 60);
const SUGGESTION_MAX_TOKENS: u32 = 2000;

const MAX_REVIEWS_PER_MOVIE: usize = 10;
const MAX_TOP_GENRES: usize = 5;
const MAX_HIGH_RATED: usize = 10;
const MAX_LOW_RATED: usize = 5;
const MAX_SAMPLE_COMMENTS: usize = 5;
const COMMENT_EXCERPT_CHARS: usize = 100;
const MAX_VOTE_REASONS: usize = 5;
const MAX_VOTED_TITLES: usize = 10;

/// A movie proposed by the model and resolved against TMDB
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AiSuggestion {
    pub movie_id: Uuid,
    pub tmdb_id: i64,
    pub title: String,
    pub poster: String,
    pub description: String,
    pub genres: Vec<String>,
    pub release_date: Option<NaiveDate>,
    pub reason: String,
}

/// Per-meeting suggestion lists, reused for an hour
pub struct SuggestionCache {
    ttl: Duration,
    entries: RwLock<HashMap<Uuid, (Instant, Vec<AiSuggestion>)>>,
}

impl Default for SuggestionCache {
    fn default() -> Self {
        Self::new(SUGGESTION_TTL)
    }
}

impl SuggestionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, meeting_id: &Uuid) -> Option<Vec<AiSuggestion>> {
        let entries = self.entries.read().await;
        entries
            .get(meeting_id)
            .filter(|(stored, _)| stored.elapsed() < self.ttl)
            .map(|(_, suggestions)| suggestions.clone())
    }

    pub async fn put(&self, meeting_id: Uuid, suggestions: Vec<AiSuggestion>) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, (stored, _)| stored.elapsed() < self.ttl);
        entries.insert(meeting_id, (Instant::now(), suggestions));
    }
}

#[derive(Debug, Clone)]
struct WatchedMovie {
    title: String,
    genres: Vec<String>,
    average_rating: f64,
    reviews: Vec<(i32, String)>,
}

/// What the group watched, how they rated it and how they voted
#[derive(Debug, Default)]
pub struct GroupHistory {
    watched: Vec<WatchedMovie>,
    yes_votes: usize,
    no_votes: usize,
    yes_reasons: Vec<String>,
    no_reasons: Vec<String>,
    yes_titles: Vec<String>,
    no_titles: Vec<String>,
}

fn excerpt(comment: &str) -> String {
    comment.chars().take(COMMENT_EXCERPT_CHARS).collect()
}

fn push_distinct(titles: &mut Vec<String>, title: &str) {
    if titles.len() < MAX_VOTED_TITLES && !titles.iter().any(|t| t == title) {
        titles.push(title.to_string());
    }
}

impl GroupHistory {
    /// `meetings` latest first, `votes` newest first
    pub fn build(meetings: &[Meeting], votes: &[MeetingVote], movies: &HashMap<Uuid, Movie>) -> Self {
        let mut order: Vec<Uuid> = Vec::new();
        let mut ratings: HashMap<Uuid, Vec<(i32, String)>> = HashMap::new();

        for meeting in meetings {
            for movie_id in &meeting.movie_ids {
                if !movies.contains_key(movie_id) {
                    continue;
                }
                let entry = ratings.entry(*movie_id).or_insert_with(|| {
                    order.push(*movie_id);
                    Vec::new()
                });
                entry.extend(
                    meeting
                        .ratings
                        .iter()
                        .filter(|r| r.movie_id == Some(*movie_id))
                        .map(|r| (r.rating, r.comment.clone())),
                );
            }
        }

        let watched = order
            .iter()
            .filter_map(|id| {
                let movie = movies.get(id)?;
                let reviews = ratings.remove(id).unwrap_or_default();
                let average_rating = if reviews.is_empty() {
                    0.0
                } else {
                    reviews.iter().map(|(r, _)| *r as f64).sum::<f64>() / reviews.len() as f64
                };
                Some(WatchedMovie {
                    title: movie.title.clone(),
                    genres: movie.genres.clone(),
                    average_rating,
                    reviews: reviews.into_iter().take(MAX_REVIEWS_PER_MOVIE).collect(),
                })
            })
            .collect();

        let mut history = GroupHistory {
            watched,
            ..Default::default()
        };

        for vote in votes {
            let title = movies.get(&vote.movie_id).map(|m| m.title.as_str());
            let reason = vote.reason.as_deref().filter(|r| !r.is_empty());
            match vote.vote_type {
                MeetingVoteType::Yes => {
                    history.yes_votes += 1;
                    if let Some(reason) = reason {
                        if history.yes_reasons.len() < MAX_VOTE_REASONS {
                            history.yes_reasons.push(reason.to_string());
                        }
                    }
                    if let Some(title) = title {
                        push_distinct(&mut history.yes_titles, title);
                    }
                }
                MeetingVoteType::No => {
                    history.no_votes += 1;
                    if let Some(reason) = reason {
                        if history.no_reasons.len() < MAX_VOTE_REASONS {
                            history.no_reasons.push(reason.to_string());
                        }
                    }
                    if let Some(title) = title {
                        push_distinct(&mut history.no_titles, title);
                    }
                }
            }
        }

        history
    }

    pub fn is_empty(&self) -> bool {
        self.watched.is_empty()
    }

    /// Most frequent genres; ties keep first-seen order
    pub fn top_genres(&self) -> Vec<String> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for genre in self.watched.iter().flat_map(|m| m.genres.iter()) {
            match counts.iter_mut().find(|(g, _)| g == genre) {
                Some((_, n)) => *n += 1,
                None => counts.push((genre.clone(), 1)),
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
            .into_iter()
            .take(MAX_TOP_GENRES)
            .map(|(g, _)| g)
            .collect()
    }

    pub fn high_rated(&self) -> Vec<&str> {
        self.watched
            .iter()
            .filter(|m| m.average_rating >= 4.0)
            .take(MAX_HIGH_RATED)
            .map(|m| m.title.as_str())
            .collect()
    }

    /// Unrated movies average 0 and count as low rated
    pub fn low_rated(&self) -> Vec<&str> {
        self.watched
            .iter()
            .filter(|m| m.average_rating <= 2.0)
            .take(MAX_LOW_RATED)
            .map(|m| m.title.as_str())
            .collect()
    }

    fn sample_comments(&self, keep: impl Fn(i32) -> bool) -> Vec<String> {
        self.watched
            .iter()
            .flat_map(|m| m.reviews.iter())
            .filter(|(rating, _)| keep(*rating))
            .take(MAX_SAMPLE_COMMENTS)
            .map(|(_, comment)| excerpt(comment))
            .collect()
    }

    pub fn positive_comments(&self) -> Vec<String> {
        self.sample_comments(|r| r >= 4)
    }

    pub fn negative_comments(&self) -> Vec<String> {
        self.sample_comments(|r| r <= 2)
    }

    pub fn watched_titles(&self) -> Vec<&str> {
        self.watched.iter().map(|m| m.title.as_str()).collect()
    }
}

const RESPONSE_FORMAT: &str = r#"Return ONLY valid JSON in this exact format:
{
  "movies": [
    {
      "title": "Exact Movie Title",
      "reason": "Brief explanation of why this movie is a good choice..."
    }
  ]
}"#;

fn or_none_yet(items: &[&str]) -> String {
    if items.is_empty() {
        "None yet".to_string()
    } else {
        items.join(", ")
    }
}

fn numbered(lines: &[String]) -> String {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{}. \"{}\"", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt for a group that has not watched anything yet
pub fn cold_start_prompt(limit: usize, theme: Option<&str>) -> String {
    let mut prompt = format!(
        "Generate {limit} diverse movie recommendations for a movie night group.\n\n\
         Since this is a new group with no viewing history yet, suggest a variety of:\n\
         - Popular and critically acclaimed films\n\
         - Different genres (action, comedy, drama, thriller, sci-fi, etc.)\n\
         - Different eras (classics and modern films)\n\
         - Mix of well-known and lesser-known gems"
    );
    if let Some(theme) = theme {
        let _ = write!(
            prompt,
            "\n\nSPECIAL THEME FOR THIS MEETING:\n\
             The group has requested movies that fit this theme: \"{theme}\"\n\
             Prioritize movies that align with this theme while keeping variety."
        );
    }
    let _ = write!(
        prompt,
        "\n\nFor each movie, provide:\n\
         - The exact movie title (must be searchable on TMDB)\n\
         - A brief explanation (2-3 sentences) of why this movie is a good choice{}\n\n{}",
        if theme.is_some() {
            ", referencing how it relates to the theme"
        } else {
            ""
        },
        RESPONSE_FORMAT
    );
    prompt
}

/// Prompt built from the group's ratings, reviews and candidate votes
pub fn history_prompt(history: &GroupHistory, limit: usize, theme: Option<&str>) -> String {
    let top_genres = history.top_genres();
    let genres: Vec<&str> = top_genres.iter().map(String::as_str).collect();
    let positive = history.positive_comments();
    let negative = history.negative_comments();

    let mut prompt = String::from(
        "Analyze this movie night group's viewing history, reviews and voting preferences.\n\n",
    );

    let _ = writeln!(prompt, "GROUP'S MOVIE HISTORY:");
    let _ = writeln!(prompt, "- Total movies watched: {}", history.watched.len());
    let _ = writeln!(prompt, "- Top genres: {}", or_none_yet(&genres));
    let _ = writeln!(
        prompt,
        "- Highly rated movies (4+ stars): {}",
        or_none_yet(&history.high_rated())
    );
    let _ = writeln!(
        prompt,
        "- Low rated movies (2 stars or less): {}",
        or_none_yet(&history.low_rated())
    );

    let _ = writeln!(prompt, "\nREVIEW PATTERNS:");
    if positive.is_empty() {
        let _ = writeln!(prompt, "No positive reviews yet");
    } else {
        let _ = writeln!(prompt, "Positive review themes:\n{}", numbered(&positive));
    }
    if negative.is_empty() {
        let _ = writeln!(prompt, "No negative reviews yet");
    } else {
        let _ = writeln!(prompt, "Negative review themes:\n{}", numbered(&negative));
    }

    let _ = writeln!(prompt, "\nVOTING PATTERNS:");
    if history.yes_votes == 0 {
        let _ = writeln!(prompt, "No yes votes yet");
    } else {
        let _ = writeln!(
            prompt,
            "Movies they voted YES on ({} votes): {}",
            history.yes_votes,
            history.yes_titles.join(", ")
        );
    }
    if !history.yes_reasons.is_empty() {
        let _ = writeln!(prompt, "Reasons for YES votes:\n{}", numbered(&history.yes_reasons));
    }
    if history.no_votes == 0 {
        let _ = writeln!(prompt, "No no votes yet");
    } else {
        let _ = writeln!(
            prompt,
            "Movies they voted NO on ({} votes): {}",
            history.no_votes,
            history.no_titles.join(", ")
        );
    }
    if !history.no_reasons.is_empty() {
        let _ = writeln!(prompt, "Reasons for NO votes:\n{}", numbered(&history.no_reasons));
    }

    if let Some(theme) = theme {
        let _ = writeln!(
            prompt,
            "\nSPECIAL THEME FOR THIS MEETING:\n\
             The group has requested movies that fit this theme: \"{theme}\"\n\
             Prioritize movies that align with this theme while still considering their preferences."
        );
    }

    let _ = write!(
        prompt,
        "\nTASK:\nGenerate {limit} diverse movie recommendations for this group. Consider:\n\
         1. Movies similar to their highly-rated films\n\
         2. Movies in genres they enjoy\n\
         3. Movies that avoid themes or styles they disliked\n\
         4. Movies similar to ones they voted YES on\n\
         5. Avoid movies they voted NO on (unless the reasons don't apply)\n\
         6. Variety in genres, eras and styles\n\
         7. Mix of popular and lesser-known films\n\
         8. Avoid movies they've already watched: {}",
        history.watched_titles().join(", ")
    );
    if theme.is_some() {
        let _ = write!(prompt, "\n9. Prioritize movies that fit the meeting theme");
    }
    let _ = write!(
        prompt,
        "\n\nFor each movie, provide:\n\
         - The exact movie title (must be searchable on TMDB)\n\
         - A brief explanation (2-3 sentences) of why this movie fits the group's preferences, \
         referencing their voting patterns and reviews{}\n\n{}",
        if theme.is_some() {
            ", and how it relates to the theme"
        } else {
            ""
        },
        RESPONSE_FORMAT
    );
    prompt
}

/// One entry of the model's `movies` array
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ProposedMovie {
    pub title: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Deserialize)]
struct ProposedMovies {
    movies: Option<Vec<ProposedMovie>>,
}

pub fn parse_suggestions(raw: &str) -> AppResult<Vec<ProposedMovie>> {
    let parsed: ProposedMovies = serde_json::from_str(raw).map_err(|e| {
        tracing::error!(error = %e, response = %raw, "Failed to parse AI response");
        AppError::ExternalApi("Invalid JSON response from AI".to_string())
    })?;
    parsed
        .movies
        .ok_or_else(|| AppError::ExternalApi("Invalid response format from AI".to_string()))
}

/// Returns the stored movie for a TMDB id, creating it from TMDB metadata
/// when it is not known yet
pub async fn get_or_create_movie(
    store: &dyn Store,
    movies: &dyn MovieProvider,
    tmdb_id: i64,
    added_by: Option<Uuid>,
) -> AppResult<Movie> {
    if let Some(movie) = store.find_movie_by_tmdb_id(tmdb_id).await? {
        return Ok(movie);
    }
    let details = movies.details(tmdb_id).await?;
    let (movie, created) = store
        .insert_movie(&Movie::from_details(details, added_by))
        .await?;
    if created {
        tracing::info!(movie_id = %movie.id, tmdb_id, title = %movie.title, "Stored new movie");
    }
    Ok(movie)
}

async fn resolve(
    store: &dyn Store,
    movies: &dyn MovieProvider,
    proposed: &ProposedMovie,
) -> AppResult<Option<AiSuggestion>> {
    let hits = movies.search(&proposed.title, 1).await?;
    let Some(first) = hits.results.first() else {
        tracing::warn!(title = %proposed.title, "Suggested movie not found on TMDB");
        return Ok(None);
    };
    let movie = get_or_create_movie(store, movies, first.id, None).await?;
    Ok(Some(AiSuggestion {
        movie_id: movie.id,
        tmdb_id: movie.tmdb_id,
        title: movie.title,
        poster: movie.poster,
        description: movie.description,
        genres: movie.genres,
        release_date: movie.release_date,
        reason: proposed.reason.clone(),
    }))
}

/// Produces up to `limit` suggestions for a meeting, reusing a cached list
/// younger than an hour
pub async fn generate_suggestions(
    store: &dyn Store,
    movies: &dyn MovieProvider,
    llm: &dyn ChatCompletion,
    cache: &SuggestionCache,
    meeting: &Meeting,
    limit: usize,
    now: DateTime<Utc>,
) -> AppResult<Vec<AiSuggestion>> {
    if let Some(cached) = cache.get(&meeting.id).await {
        tracing::debug!(meeting_id = %meeting.id, "Using cached AI suggestions");
        return Ok(cached);
    }

    let theme = meeting.theme.as_deref().filter(|t| !t.trim().is_empty());
    let past = store.past_meetings_with_movies(now).await?;

    let prompt = if past.is_empty() {
        cold_start_prompt(limit, theme)
    } else {
        let past_ids: Vec<Uuid> = past.iter().map(|m| m.id).collect();
        let votes = store.meeting_votes_in(&past_ids).await?;

        let mut movie_ids: Vec<Uuid> = past
            .iter()
            .flat_map(|m| m.movie_ids.iter().copied())
            .chain(votes.iter().map(|v| v.movie_id))
            .collect();
        movie_ids.sort();
        movie_ids.dedup();
        let known: HashMap<Uuid, Movie> = store
            .find_movies(&movie_ids)
            .await?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();

        let history = GroupHistory::build(&past, &votes, &known);
        if history.is_empty() {
            cold_start_prompt(limit, theme)
        } else {
            history_prompt(&history, limit, theme)
        }
    };

    tracing::info!(
        meeting_id = %meeting.id,
        past_meetings = past.len(),
        limit,
        "Requesting AI suggestions"
    );

    let raw = llm
        .complete(SYSTEM_PROMPT, &prompt, SUGGESTION_MAX_TOKENS)
        .await?;
    let proposed = parse_suggestions(&raw)?;

    let resolved = join_all(
        proposed
            .iter()
            .take(limit)
            .map(|entry| async move { (entry, resolve(store, movies, entry).await) }),
    )
    .await;

    let mut suggestions = Vec::new();
    for (entry, outcome) in resolved {
        match outcome {
            Ok(Some(suggestion)) => suggestions.push(suggestion),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(title = %entry.title, error = %e, "Dropping unresolvable suggestion");
            }
        }
    }

    tracing::info!(
        meeting_id = %meeting.id,
        proposed = proposed.len(),
        resolved = suggestions.len(),
        "AI suggestions resolved"
    );

    cache.put(meeting.id, suggestions.clone()).await;
    Ok(suggestions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::MemoryStore,
        models::{MovieDetails, MovieSearchPage, MovieSearchResult},
        services::{llm::MockChatCompletion, tmdb::MockMovieProvider},
    };
    use chrono::Duration as ChronoDuration;
    use mockall::predicate::*;

    fn details(tmdb_id: i64, title: &str, genres: &[&str]) -> MovieDetails {
        MovieDetails {
            tmdb_id,
            title: title.to_string(),
            poster: format!("https://image.tmdb.org/t/p/w500/{}.jpg", tmdb_id),
            trailer: None,
            description: format!("About {}", title),
            genres: genres.iter().map(|g| g.to_string()).collect(),
            release_date: None,
            runtime: None,
        }
    }

    fn hit(tmdb_id: i64, title: &str) -> MovieSearchPage {
        MovieSearchPage {
            results: vec![MovieSearchResult {
                id: tmdb_id,
                title: title.to_string(),
                overview: String::new(),
                poster: None,
                release_date: None,
                genre_ids: vec![],
            }],
            total_results: 1,
            total_pages: 1,
            page: 1,
        }
    }

    fn review(n: usize) -> String {
        format!("{} {}", "A thoughtful review that easily clears the minimum length.", n)
    }

    #[test]
    fn test_cold_start_prompt_mentions_theme() {
        let plain = cold_start_prompt(7, None);
        assert!(plain.contains("Generate 7 diverse"));
        assert!(plain.contains("no viewing history yet"));
        assert!(!plain.contains("SPECIAL THEME"));

        let themed = cold_start_prompt(3, Some("Heist night"));
        assert!(themed.contains("\"Heist night\""));
        assert!(themed.contains("referencing how it relates to the theme"));
    }

    #[test]
    fn test_group_history_aggregation() {
        let now = Utc::now();
        let user = Uuid::new_v4();
        let loved = Movie::from_details(details(1, "Heat", &["Crime", "Thriller"]), None);
        let hated = Movie::from_details(details(2, "Cats", &["Musical"]), None);
        let candidate = Movie::from_details(details(3, "Ronin", &["Thriller"]), None);

        let mut meeting = Meeting::new(
            now - ChronoDuration::days(7),
            user,
            vec![loved.id, hated.id],
            now,
        );
        meeting.upsert_rating(user, Some(loved.id), 5, review(1));
        meeting.upsert_rating(Uuid::new_v4(), Some(loved.id), 4, review(2));
        meeting.upsert_rating(user, Some(hated.id), 1, "x".repeat(150));

        let votes = vec![MeetingVote {
            id: Uuid::new_v4(),
            user_id: user,
            movie_id: candidate.id,
            meeting_id: meeting.id,
            vote_type: MeetingVoteType::No,
            reason: Some("Seen it twice".to_string()),
            created_at: now,
        }];

        let movies: HashMap<Uuid, Movie> = [loved.clone(), hated.clone(), candidate]
            .into_iter()
            .map(|m| (m.id, m))
            .collect();
        let history = GroupHistory::build(&[meeting], &votes, &movies);

        assert_eq!(history.watched_titles(), vec!["Heat", "Cats"]);
        assert_eq!(history.top_genres()[0], "Crime");
        assert_eq!(history.high_rated(), vec!["Heat"]);
        assert_eq!(history.low_rated(), vec!["Cats"]);
        assert_eq!(history.positive_comments().len(), 2);
        assert_eq!(history.negative_comments()[0].chars().count(), 100);

        let prompt = history_prompt(&history, 5, None);
        assert!(prompt.contains("Total movies watched: 2"));
        assert!(prompt.contains("Movies they voted NO on (1 votes): Ronin"));
        assert!(prompt.contains("\"Seen it twice\""));
        assert!(prompt.contains("No yes votes yet"));
        assert!(prompt.contains("already watched: Heat, Cats"));
    }

    #[test]
    fn test_parse_suggestions() {
        let parsed =
            parse_suggestions(r#"{"movies": [{"title": "Heat", "reason": "Tense"}]}"#).unwrap();
        assert_eq!(parsed[0].title, "Heat");
        assert!(parse_suggestions("not json").is_err());
        assert!(parse_suggestions(r#"{"films": []}"#).is_err());
    }

    #[tokio::test]
    async fn test_cold_start_used_without_history() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let mut meeting = Meeting::new(now + ChronoDuration::days(3), Uuid::new_v4(), vec![], now);
        store.create_meeting(&mut meeting).await.unwrap();

        let mut llm = MockChatCompletion::new();
        llm.expect_complete()
            .withf(|system, user, max_tokens| {
                system == SYSTEM_PROMPT
                    && user.contains("no viewing history yet")
                    && *max_tokens == SUGGESTION_MAX_TOKENS
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(r#"{"movies": [
                    {"title": "Heat", "reason": "Classic heist"},
                    {"title": "Nothing Real", "reason": "Made up"}
                ]}"#
                .to_string())
            });

        let mut tmdb = MockMovieProvider::new();
        tmdb.expect_search()
            .with(eq("Heat"), eq(1))
            .returning(|_, _| Ok(hit(949, "Heat")));
        tmdb.expect_search()
            .with(eq("Nothing Real"), eq(1))
            .returning(|_, _| {
                Ok(MovieSearchPage {
                    results: vec![],
                    total_results: 0,
                    total_pages: 0,
                    page: 1,
                })
            });
        tmdb.expect_details()
            .with(eq(949))
            .times(1)
            .returning(|id| Ok(details(id, "Heat", &["Crime"])));

        let cache = SuggestionCache::default();
        let suggestions =
            generate_suggestions(&store, &tmdb, &llm, &cache, &meeting, 7, now)
                .await
                .unwrap();

        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].title, "Heat");
        assert_eq!(suggestions[0].reason, "Classic heist");
        assert!(store.find_movie_by_tmdb_id(949).await.unwrap().is_some());

        // served from the cache, the mocks would panic on a second call
        let again = generate_suggestions(&store, &tmdb, &llm, &cache, &meeting, 7, now)
            .await
            .unwrap();
        assert_eq!(again, suggestions);
    }

    #[tokio::test]
    async fn test_history_prompt_used_after_a_watched_meeting() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let (watched, _) = store
            .insert_movie(&Movie::from_details(details(1, "Heat", &["Crime"]), None))
            .await
            .unwrap();
        let mut past = Meeting::new(
            now - ChronoDuration::days(7),
            Uuid::new_v4(),
            vec![watched.id],
            now,
        );
        past.upsert_rating(Uuid::new_v4(), Some(watched.id), 5, review(1));
        store.create_meeting(&mut past).await.unwrap();

        let mut upcoming = Meeting::new(now + ChronoDuration::days(7), Uuid::new_v4(), vec![], now);
        upcoming.theme = Some("Nineties".to_string());
        store.create_meeting(&mut upcoming).await.unwrap();

        let mut llm = MockChatCompletion::new();
        llm.expect_complete()
            .withf(|_, user, _| {
                user.contains("Highly rated movies (4+ stars): Heat")
                    && user.contains("\"Nineties\"")
                    && !user.contains("no viewing history yet")
            })
            .times(1)
            .returning(|_, _, _| Ok(r#"{"movies": []}"#.to_string()));
        let tmdb = MockMovieProvider::new();

        let suggestions = generate_suggestions(
            &store,
            &tmdb,
            &llm,
            &SuggestionCache::default(),
            &upcoming,
            7,
            now,
        )
        .await
        .unwrap();
        assert!(suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_resolved_suggestions_keep_model_order() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let mut meeting = Meeting::new(now + ChronoDuration::days(3), Uuid::new_v4(), vec![], now);
        store.create_meeting(&mut meeting).await.unwrap();

        let mut llm = MockChatCompletion::new();
        llm.expect_complete().times(1).returning(|_, _, _| {
            Ok(r#"{"movies": [
                {"title": "Alien", "reason": "one"},
                {"title": "Broken", "reason": "two"},
                {"title": "Casino", "reason": "three"},
                {"title": "Over Limit", "reason": "four"}
            ]}"#
            .to_string())
        });

        // "Over Limit" has no expectation: searching it would panic
        let mut tmdb = MockMovieProvider::new();
        for (id, title) in [(1, "Alien"), (2, "Broken"), (3, "Casino")] {
            tmdb.expect_search()
                .with(eq(title), eq(1))
                .returning(move |_, _| Ok(hit(id, title)));
        }
        tmdb.expect_details()
            .with(eq(2))
            .returning(|_| Err(AppError::ExternalApi("Failed to fetch movie details".to_string())));
        tmdb.expect_details()
            .returning(|id| Ok(details(id, if id == 1 { "Alien" } else { "Casino" }, &[])));

        let suggestions = generate_suggestions(
            &store,
            &tmdb,
            &llm,
            &SuggestionCache::default(),
            &meeting,
            3,
            now,
        )
        .await
        .unwrap();

        let titles: Vec<&str> = suggestions.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Alien", "Casino"]);
        assert_eq!(suggestions[1].reason, "three");
    }

    #[tokio::test]
    async fn test_get_or_create_movie_reuses_existing() {
        let store = MemoryStore::new();
        let (existing, _) = store
            .insert_movie(&Movie::from_details(details(603, "The Matrix", &[]), None))
            .await
            .unwrap();
        let tmdb = MockMovieProvider::new();
        let movie = get_or_create_movie(&store, &tmdb, 603, None).await.unwrap();
        assert_eq!(movie.id, existing.id);
    }
}
