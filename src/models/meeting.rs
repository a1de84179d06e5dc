use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use uuid::Uuid;

use super::{Movie, UserSummary};

/// Shortest accepted review comment, in UTF-16 code units
pub const MIN_COMMENT_CHARS: usize = 50;

/// Each member may propose this many candidates per meeting
pub const MAX_SUGGESTIONS_PER_USER: usize = 2;

/// Longest accepted reason on a meeting vote, in UTF-16 code units
pub const MAX_VOTE_REASON_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MeetingStatus {
    Upcoming,
    Watched,
}

impl MeetingStatus {
    /// Status implied by the meeting date
    pub fn for_date(date: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if date > now {
            MeetingStatus::Upcoming
        } else {
            MeetingStatus::Watched
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingStatus::Upcoming => "upcoming",
            MeetingStatus::Watched => "watched",
        }
    }
}

impl FromStr for MeetingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(MeetingStatus::Upcoming),
            "watched" => Ok(MeetingStatus::Watched),
            other => Err(format!("unknown meeting status: {}", other)),
        }
    }
}

/// A member's review of a movie watched at a meeting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: Uuid,
    pub user_id: Uuid,
    pub movie_id: Option<Uuid>,
    pub rating: i32,
    pub comment: String,
}

/// A member's rating of the gathering itself
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatheringRating {
    pub id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
}

/// A candidate proposed by a member
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub user_id: Uuid,
    pub movie_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A scheduled or past movie night
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: Uuid,
    pub movie_ids: Vec<Uuid>,
    pub candidates: Vec<Uuid>,
    pub watched_date: DateTime<Utc>,
    pub host_id: Uuid,
    pub location: Option<String>,
    pub theme: Option<String>,
    pub ratings: Vec<Rating>,
    pub gathering_ratings: Vec<GatheringRating>,
    pub suggestions: Vec<Suggestion>,
    pub average_rating: f64,
    pub average_gathering_rating: f64,
    pub status: MeetingStatus,
}

/// Rejects scores outside 1..=5
pub fn validate_score(rating: Option<i32>) -> Result<i32, String> {
    match rating {
        Some(r) if (1..=5).contains(&r) => Ok(r),
        _ => Err("Rating must be between 1 and 5".to_string()),
    }
}

/// Length as browsers count it: emoji outside the BMP count twice
pub fn text_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Rejects review comments shorter than [`MIN_COMMENT_CHARS`]
pub fn validate_comment(comment: Option<&str>) -> Result<&str, String> {
    match comment {
        Some(c) if text_len(c) >= MIN_COMMENT_CHARS => Ok(c),
        _ => Err(format!(
            "Comment must be at least {} characters",
            MIN_COMMENT_CHARS
        )),
    }
}

fn average(scores: impl Iterator<Item = i32>) -> f64 {
    let (sum, count) = scores.fold((0i64, 0u32), |(s, c), r| (s + r as i64, c + 1));
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

impl Meeting {
    pub fn new(
        watched_date: DateTime<Utc>,
        host_id: Uuid,
        movie_ids: Vec<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            movie_ids,
            candidates: Vec::new(),
            watched_date,
            host_id,
            location: None,
            theme: None,
            ratings: Vec::new(),
            gathering_ratings: Vec::new(),
            suggestions: Vec::new(),
            average_rating: 0.0,
            average_gathering_rating: 0.0,
            status: MeetingStatus::for_date(watched_date, now),
        }
    }

    /// Moves the meeting and re-derives its status
    pub fn reschedule(&mut self, watched_date: DateTime<Utc>, now: DateTime<Utc>) {
        self.watched_date = watched_date;
        self.status = MeetingStatus::for_date(watched_date, now);
    }

    /// Runs before every save
    pub fn recompute_averages(&mut self) {
        self.average_rating = average(self.ratings.iter().map(|r| r.rating));
        self.average_gathering_rating = average(self.gathering_ratings.iter().map(|r| r.rating));
    }

    /// Votes stay open unless the meeting is both marked watched and in the past
    pub fn accepts_votes(&self, now: DateTime<Utc>) -> bool {
        self.status == MeetingStatus::Upcoming || self.watched_date > now
    }

    /// Bring-list changes need an upcoming meeting that has not started
    pub fn is_future(&self, now: DateTime<Utc>) -> bool {
        self.status == MeetingStatus::Upcoming && self.watched_date > now
    }

    /// A meeting counts as history once watched or past its date
    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.status == MeetingStatus::Watched || self.watched_date < now
    }

    pub fn is_candidate(&self, movie_id: &Uuid) -> bool {
        self.candidates.contains(movie_id)
    }

    /// Returns false when the movie already was a candidate
    pub fn add_candidate(&mut self, movie_id: Uuid) -> bool {
        if self.is_candidate(&movie_id) {
            return false;
        }
        self.candidates.push(movie_id);
        true
    }

    pub fn remove_candidate(&mut self, movie_id: &Uuid) {
        self.candidates.retain(|id| id != movie_id);
    }

    pub fn suggestions_by(&self, user_id: &Uuid) -> Vec<&Suggestion> {
        self.suggestions
            .iter()
            .filter(|s| &s.user_id == user_id)
            .collect()
    }

    /// Replaces the user's earlier rating for the same movie, or any earlier
    /// rating when no movie is given
    pub fn upsert_rating(
        &mut self,
        user_id: Uuid,
        movie_id: Option<Uuid>,
        rating: i32,
        comment: String,
    ) {
        self.ratings.retain(|r| match movie_id {
            Some(m) => !(r.user_id == user_id && r.movie_id == Some(m)),
            None => r.user_id != user_id,
        });
        self.ratings.push(Rating {
            id: Uuid::new_v4(),
            user_id,
            movie_id,
            rating,
            comment,
        });
    }

    pub fn upsert_gathering_rating(&mut self, user_id: Uuid, rating: i32, comment: Option<String>) {
        self.gathering_ratings.retain(|r| r.user_id != user_id);
        self.gathering_ratings.push(GatheringRating {
            id: Uuid::new_v4(),
            user_id,
            rating,
            comment: comment.filter(|c| !c.is_empty()),
        });
    }

    /// Every movie this meeting points at
    pub fn movie_refs(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self
            .movie_ids
            .iter()
            .chain(self.candidates.iter())
            .copied()
            .chain(self.ratings.iter().filter_map(|r| r.movie_id))
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Every user this meeting points at
    pub fn user_refs(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = std::iter::once(self.host_id)
            .chain(self.ratings.iter().map(|r| r.user_id))
            .chain(self.gathering_ratings.iter().map(|r| r.user_id))
            .chain(self.suggestions.iter().map(|s| s.user_id))
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Yes/no vote on a meeting candidate
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MeetingVoteType {
    Yes,
    No,
}

impl MeetingVoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingVoteType::Yes => "yes",
            MeetingVoteType::No => "no",
        }
    }
}

impl Display for MeetingVoteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MeetingVoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(MeetingVoteType::Yes),
            "no" => Ok(MeetingVoteType::No),
            other => Err(format!("unknown vote type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MeetingVote {
    pub id: Uuid,
    pub user_id: Uuid,
    pub movie_id: Uuid,
    pub meeting_id: Uuid,
    pub vote_type: MeetingVoteType,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Meeting vote with voter and movie resolved
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingVoteView {
    pub id: Uuid,
    pub user: Option<UserSummary>,
    pub movie: Option<Movie>,
    pub meeting_id: Uuid,
    pub vote_type: MeetingVoteType,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingView {
    pub id: Uuid,
    pub user: Option<UserSummary>,
    pub movie: Option<Movie>,
    pub rating: i32,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatheringRatingView {
    pub id: Uuid,
    pub user: Option<UserSummary>,
    pub rating: i32,
    pub comment: Option<String>,
}

/// Meeting with every reference resolved
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingView {
    pub id: Uuid,
    pub movies: Vec<Movie>,
    pub candidates: Vec<Movie>,
    pub watched_date: DateTime<Utc>,
    pub host: Option<UserSummary>,
    pub location: Option<String>,
    pub theme: Option<String>,
    pub ratings: Vec<RatingView>,
    pub gathering_ratings: Vec<GatheringRatingView>,
    pub suggestions: Vec<Suggestion>,
    pub average_rating: f64,
    pub average_gathering_rating: f64,
    pub status: MeetingStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn comment() -> String {
        "A".repeat(MIN_COMMENT_CHARS)
    }

    #[test]
    fn test_status_from_date() {
        let now = Utc::now();
        assert_eq!(
            MeetingStatus::for_date(now + Duration::hours(1), now),
            MeetingStatus::Upcoming
        );
        assert_eq!(
            MeetingStatus::for_date(now - Duration::hours(1), now),
            MeetingStatus::Watched
        );
    }

    #[test]
    fn test_reschedule_updates_status() {
        let now = Utc::now();
        let mut meeting = Meeting::new(now - Duration::days(3), Uuid::new_v4(), vec![], now);
        assert_eq!(meeting.status, MeetingStatus::Watched);
        meeting.reschedule(now + Duration::days(3), now);
        assert_eq!(meeting.status, MeetingStatus::Upcoming);
    }

    #[test]
    fn test_comment_minimum_length() {
        assert!(validate_comment(Some("too short")).is_err());
        assert!(validate_comment(None).is_err());
        let exact = comment();
        assert!(validate_comment(Some(&exact)).is_ok());
        // multi-byte characters count once
        let accented = "é".repeat(MIN_COMMENT_CHARS);
        assert!(validate_comment(Some(&accented)).is_ok());
        assert!(validate_comment(Some(&"é".repeat(MIN_COMMENT_CHARS - 1))).is_err());
    }

    #[test]
    fn test_astral_characters_count_twice() {
        assert_eq!(text_len("🎬"), 2);
        let emoji = "🎬".repeat(MIN_COMMENT_CHARS / 2);
        assert!(validate_comment(Some(&emoji)).is_ok());
        let short = "🎬".repeat(MIN_COMMENT_CHARS / 2 - 1);
        assert!(validate_comment(Some(&short)).is_err());
    }

    #[test]
    fn test_score_bounds() {
        assert!(validate_score(Some(0)).is_err());
        assert!(validate_score(Some(6)).is_err());
        assert!(validate_score(None).is_err());
        assert_eq!(validate_score(Some(5)), Ok(5));
    }

    #[test]
    fn test_rating_upsert_replaces_same_movie_only() {
        let now = Utc::now();
        let user = Uuid::new_v4();
        let (m1, m2) = (Uuid::new_v4(), Uuid::new_v4());
        let mut meeting = Meeting::new(now, Uuid::new_v4(), vec![m1, m2], now);

        meeting.upsert_rating(user, Some(m1), 2, comment());
        meeting.upsert_rating(user, Some(m2), 4, comment());
        meeting.upsert_rating(user, Some(m1), 5, comment());
        assert_eq!(meeting.ratings.len(), 2);

        meeting.recompute_averages();
        assert_eq!(meeting.average_rating, 4.5);
    }

    #[test]
    fn test_rating_without_movie_replaces_all_of_users() {
        let now = Utc::now();
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut meeting = Meeting::new(now, Uuid::new_v4(), vec![], now);
        meeting.upsert_rating(user, Some(Uuid::new_v4()), 3, comment());
        meeting.upsert_rating(other, None, 1, comment());
        meeting.upsert_rating(user, None, 5, comment());
        assert_eq!(meeting.ratings.len(), 2);
    }

    #[test]
    fn test_gathering_average() {
        let now = Utc::now();
        let mut meeting = Meeting::new(now, Uuid::new_v4(), vec![], now);
        meeting.upsert_gathering_rating(Uuid::new_v4(), 3, None);
        meeting.upsert_gathering_rating(Uuid::new_v4(), 4, Some(String::new()));
        meeting.recompute_averages();
        assert_eq!(meeting.average_gathering_rating, 3.5);
        assert_eq!(meeting.average_rating, 0.0);
        assert!(meeting.gathering_ratings[1].comment.is_none());
    }

    #[test]
    fn test_candidates_are_unique() {
        let now = Utc::now();
        let movie = Uuid::new_v4();
        let mut meeting = Meeting::new(now, Uuid::new_v4(), vec![], now);
        assert!(meeting.add_candidate(movie));
        assert!(!meeting.add_candidate(movie));
        meeting.remove_candidate(&movie);
        assert!(!meeting.is_candidate(&movie));
    }

    #[test]
    fn test_vote_and_item_windows() {
        let now = Utc::now();
        let past = Meeting::new(now - Duration::days(1), Uuid::new_v4(), vec![], now);
        assert!(!past.accepts_votes(now));
        assert!(!past.is_future(now));
        assert!(past.is_past(now));

        let future = Meeting::new(now + Duration::days(1), Uuid::new_v4(), vec![], now);
        assert!(future.accepts_votes(now));
        assert!(future.is_future(now));
        assert!(!future.is_past(now));
    }

    #[test]
    fn test_refs_deduplicated() {
        let now = Utc::now();
        let host = Uuid::new_v4();
        let movie = Uuid::new_v4();
        let mut meeting = Meeting::new(now, host, vec![movie], now);
        meeting.add_candidate(movie);
        meeting.upsert_rating(host, Some(movie), 4, comment());
        assert_eq!(meeting.movie_refs(), vec![movie]);
        assert_eq!(meeting.user_refs(), vec![host]);
    }
}
