use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Cycle, FreeEvening, Item, LikeCount, Meeting, MeetingVote, Movie, User, Vote},
};

/// Persistence boundary for every collection the API touches
///
/// Uniqueness rules (one vote per user/movie/event, one free evening per
/// user/date, unique usernames and TMDB ids) are enforced by the
/// implementation and surface as [`crate::error::AppError::Conflict`].
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Cheap round trip used by the health check
    async fn ping(&self) -> AppResult<()>;

    // Users

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Case-insensitive lookup on the trimmed username
    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>>;

    async fn find_users(&self, ids: &[Uuid]) -> AppResult<Vec<User>>;

    /// Newest first
    async fn list_users(&self) -> AppResult<Vec<User>>;

    async fn insert_user(&self, user: &User) -> AppResult<()>;

    async fn update_user(&self, user: &User) -> AppResult<()>;

    async fn delete_user(&self, id: Uuid) -> AppResult<bool>;

    // Movies

    async fn find_movie(&self, id: Uuid) -> AppResult<Option<Movie>>;

    async fn find_movie_by_tmdb_id(&self, tmdb_id: i64) -> AppResult<Option<Movie>>;

    async fn find_movies(&self, ids: &[Uuid]) -> AppResult<Vec<Movie>>;

    /// Newest first
    async fn list_movies(&self) -> AppResult<Vec<Movie>>;

    /// Stores the movie unless its TMDB id is already known. Returns the
    /// stored record and whether it was created by this call.
    async fn insert_movie(&self, movie: &Movie) -> AppResult<(Movie, bool)>;

    // Cycles

    async fn find_cycle(&self, id: Uuid) -> AppResult<Option<Cycle>>;

    /// Newest first
    async fn list_cycles(&self) -> AppResult<Vec<Cycle>>;

    async fn active_cycle(&self) -> AppResult<Option<Cycle>>;

    async fn insert_cycle(&self, cycle: &Cycle) -> AppResult<()>;

    async fn update_cycle(&self, cycle: &Cycle) -> AppResult<()>;

    /// Deactivates every active cycle except `keep`
    async fn deactivate_cycles(&self, keep: Option<Uuid>) -> AppResult<u64>;

    // Cycle votes

    /// Drops the user's previous vote on the same movie and cycle, then
    /// inserts the new one
    async fn replace_vote(&self, vote: &Vote) -> AppResult<()>;

    async fn user_cycle_votes(&self, user_id: Uuid, cycle_id: Uuid) -> AppResult<Vec<Vote>>;

    /// Likes per movie, most liked first
    async fn like_counts(&self, cycle_id: Uuid) -> AppResult<Vec<LikeCount>>;

    // Meetings

    async fn find_meeting(&self, id: Uuid) -> AppResult<Option<Meeting>>;

    /// Latest meeting date first
    async fn list_meetings(&self) -> AppResult<Vec<Meeting>>;

    async fn insert_meeting(&self, meeting: &Meeting) -> AppResult<()>;

    async fn write_meeting(&self, meeting: &Meeting) -> AppResult<()>;

    async fn delete_meeting(&self, id: Uuid) -> AppResult<bool>;

    /// Meetings with `start <= watched_date < end`
    async fn meetings_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Meeting>>;

    /// Watched or past meetings that have at least one movie, latest first
    async fn past_meetings_with_movies(&self, now: DateTime<Utc>) -> AppResult<Vec<Meeting>>;

    /// Inserts a new meeting with fresh averages
    async fn create_meeting(&self, meeting: &mut Meeting) -> AppResult<()> {
        meeting.recompute_averages();
        self.insert_meeting(meeting).await
    }

    /// Persists a changed meeting with fresh averages
    async fn save_meeting(&self, meeting: &mut Meeting) -> AppResult<()> {
        meeting.recompute_averages();
        self.write_meeting(meeting).await
    }

    // Meeting votes

    /// Same replace semantics as [`Store::replace_vote`]
    async fn replace_meeting_vote(&self, vote: &MeetingVote) -> AppResult<()>;

    async fn meeting_votes(&self, meeting_id: Uuid) -> AppResult<Vec<MeetingVote>>;

    /// Votes across several meetings, newest first
    async fn meeting_votes_in(&self, meeting_ids: &[Uuid]) -> AppResult<Vec<MeetingVote>>;

    async fn user_meeting_votes(&self, user_id: Uuid, meeting_id: Uuid)
        -> AppResult<Vec<MeetingVote>>;

    async fn delete_meeting_votes_for_movie(&self, meeting_id: Uuid, movie_id: Uuid)
        -> AppResult<u64>;

    // Items

    async fn items_for_event(&self, event_id: Uuid) -> AppResult<Vec<Item>>;

    async fn find_item(&self, id: Uuid) -> AppResult<Option<Item>>;

    /// The item `user_id` currently holds for the event, if any
    async fn claimed_item(&self, event_id: Uuid, user_id: Uuid) -> AppResult<Option<Item>>;

    async fn insert_item(&self, item: &Item) -> AppResult<()>;

    async fn update_item(&self, item: &Item) -> AppResult<()>;

    async fn delete_item(&self, id: Uuid) -> AppResult<bool>;

    // Free evenings

    /// Inclusive range, ordered by date
    async fn free_evenings_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<FreeEvening>>;

    async fn user_free_evenings_between(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<FreeEvening>>;

    async fn insert_free_evening(&self, evening: &FreeEvening) -> AppResult<()>;

    async fn delete_free_evening(&self, user_id: Uuid, date: NaiveDate) -> AppResult<bool>;
}

pub const DUPLICATE_VOTE: &str = "You have already voted for this movie";
pub const DUPLICATE_USERNAME: &str = "Username already exists";
pub const DUPLICATE_FREE_EVENING: &str = "Free evening already marked";
pub const DUPLICATE_CLAIM: &str = "You can only claim one item per event";
pub const DUPLICATE_ACTIVE_CYCLE: &str = "Another cycle is already active";
