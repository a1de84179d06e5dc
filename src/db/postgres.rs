use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool};
use uuid::Uuid;

use crate::{
    db::store::{
        Store, DUPLICATE_ACTIVE_CYCLE, DUPLICATE_CLAIM, DUPLICATE_FREE_EVENING,
        DUPLICATE_USERNAME, DUPLICATE_VOTE,
    },
    error::{AppError, AppResult},
    models::{
        Cycle, FreeEvening, GatheringRating, Item, LikeCount, Meeting, MeetingVote, Movie,
        Preferences, Rating, Suggestion, User, Vote,
    },
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies the schema in `migrations/`
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Maps a unique-index violation to a user-facing conflict
fn unique_violation(message: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::Database(e),
    }
}

fn parse_column<T: std::str::FromStr<Err = String>>(raw: &str) -> AppResult<T> {
    raw.parse()
        .map_err(|e: String| AppError::Internal(format!("Corrupt row: {}", e)))
}

// ============================================================================
// Row types
// ============================================================================

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    pattern_hash: Option<String>,
    display_name: Option<String>,
    display_name_color: String,
    avatar: Option<String>,
    is_admin: bool,
    genres: Vec<String>,
    favorite_movie_ids: Vec<i64>,
    optional_text: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            pattern_hash: row.pattern_hash,
            display_name: row.display_name,
            display_name_color: row.display_name_color,
            avatar: row.avatar,
            is_admin: row.is_admin,
            preferences: Preferences {
                genres: row.genres,
                favorite_movie_ids: row.favorite_movie_ids,
                optional_text: row.optional_text,
            },
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct MovieRow {
    id: Uuid,
    tmdb_id: i64,
    title: String,
    poster: String,
    trailer: Option<String>,
    description: String,
    genres: Vec<String>,
    release_date: Option<NaiveDate>,
    runtime: Option<i32>,
    added_by: Option<Uuid>,
    added_at: DateTime<Utc>,
}

impl From<MovieRow> for Movie {
    fn from(row: MovieRow) -> Self {
        Movie {
            id: row.id,
            tmdb_id: row.tmdb_id,
            title: row.title,
            poster: row.poster,
            trailer: row.trailer,
            description: row.description,
            genres: row.genres,
            release_date: row.release_date,
            runtime: row.runtime,
            added_by: row.added_by,
            added_at: row.added_at,
        }
    }
}

#[derive(FromRow)]
struct CycleRow {
    id: Uuid,
    is_active: bool,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    meeting_time: Option<DateTime<Utc>>,
    location: Option<String>,
    movies: Vec<Uuid>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

impl From<CycleRow> for Cycle {
    fn from(row: CycleRow) -> Self {
        Cycle {
            id: row.id,
            is_active: row.is_active,
            start_date: row.start_date,
            end_date: row.end_date,
            meeting_time: row.meeting_time,
            location: row.location,
            movies: row.movies,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct VoteRow {
    id: Uuid,
    user_id: Uuid,
    movie_id: Uuid,
    cycle_id: Uuid,
    vote_type: String,
    review: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<VoteRow> for Vote {
    type Error = AppError;

    fn try_from(row: VoteRow) -> AppResult<Self> {
        Ok(Vote {
            id: row.id,
            user_id: row.user_id,
            movie_id: row.movie_id,
            cycle_id: row.cycle_id,
            vote_type: parse_column(&row.vote_type)?,
            review: row.review,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct MeetingRow {
    id: Uuid,
    movie_ids: Vec<Uuid>,
    candidates: Vec<Uuid>,
    watched_date: DateTime<Utc>,
    host_id: Uuid,
    location: Option<String>,
    theme: Option<String>,
    ratings: Json<Vec<Rating>>,
    gathering_ratings: Json<Vec<GatheringRating>>,
    suggestions: Json<Vec<Suggestion>>,
    average_rating: f64,
    average_gathering_rating: f64,
    status: String,
}

impl TryFrom<MeetingRow> for Meeting {
    type Error = AppError;

    fn try_from(row: MeetingRow) -> AppResult<Self> {
        Ok(Meeting {
            id: row.id,
            movie_ids: row.movie_ids,
            candidates: row.candidates,
            watched_date: row.watched_date,
            host_id: row.host_id,
            location: row.location,
            theme: row.theme,
            ratings: row.ratings.0,
            gathering_ratings: row.gathering_ratings.0,
            suggestions: row.suggestions.0,
            average_rating: row.average_rating,
            average_gathering_rating: row.average_gathering_rating,
            status: parse_column(&row.status)?,
        })
    }
}

#[derive(FromRow)]
struct MeetingVoteRow {
    id: Uuid,
    user_id: Uuid,
    movie_id: Uuid,
    meeting_id: Uuid,
    vote_type: String,
    reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MeetingVoteRow> for MeetingVote {
    type Error = AppError;

    fn try_from(row: MeetingVoteRow) -> AppResult<Self> {
        Ok(MeetingVote {
            id: row.id,
            user_id: row.user_id,
            movie_id: row.movie_id,
            meeting_id: row.meeting_id,
            vote_type: parse_column(&row.vote_type)?,
            reason: row.reason,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct ItemRow {
    id: Uuid,
    event_id: Uuid,
    name: String,
    claimed_by: Option<Uuid>,
    claimed_at: Option<DateTime<Utc>>,
    status: String,
}

impl TryFrom<ItemRow> for Item {
    type Error = AppError;

    fn try_from(row: ItemRow) -> AppResult<Self> {
        Ok(Item {
            id: row.id,
            event_id: row.event_id,
            name: row.name,
            claimed_by: row.claimed_by,
            claimed_at: row.claimed_at,
            status: parse_column(&row.status)?,
        })
    }
}

#[derive(FromRow)]
struct FreeEveningRow {
    id: Uuid,
    user_id: Uuid,
    date: NaiveDate,
    created_at: DateTime<Utc>,
}

impl From<FreeEveningRow> for FreeEvening {
    fn from(row: FreeEveningRow) -> Self {
        FreeEvening {
            id: row.id,
            user_id: row.user_id,
            date: row.date,
            created_at: row.created_at,
        }
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> AppResult<Vec<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

const USER_COLUMNS: &str = "id, username, pattern_hash, display_name, display_name_color, avatar, \
     is_admin, genres, favorite_movie_ids, optional_text, created_at";

const MOVIE_COLUMNS: &str = "id, tmdb_id, title, poster, trailer, description, genres, \
     release_date, runtime, added_by, added_at";

const CYCLE_COLUMNS: &str =
    "id, is_active, start_date, end_date, meeting_time, location, movies, created_by, created_at";

const MEETING_COLUMNS: &str = "id, movie_ids, candidates, watched_date, host_id, location, theme, \
     ratings, gathering_ratings, suggestions, average_rating, average_gathering_rating, status";

const MEETING_VOTE_COLUMNS: &str =
    "id, user_id, movie_id, meeting_id, vote_type, reason, created_at";

const ITEM_COLUMNS: &str = "id, event_id, name, claimed_by, claimed_at, status";

/// PostgreSQL-backed [`Store`]
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Store for PgStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE lower(username) = lower($1)",
            USER_COLUMNS
        ))
        .bind(username.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn find_users(&self, ids: &[Uuid]) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = ANY($1)",
            USER_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users ORDER BY created_at DESC",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn insert_user(&self, user: &User) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, pattern_hash, display_name, display_name_color,
                               avatar, is_admin, genres, favorite_movie_ids, optional_text, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.pattern_hash)
        .bind(&user.display_name)
        .bind(&user.display_name_color)
        .bind(&user.avatar)
        .bind(user.is_admin)
        .bind(&user.preferences.genres)
        .bind(&user.preferences.favorite_movie_ids)
        .bind(&user.preferences.optional_text)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(unique_violation(DUPLICATE_USERNAME))?;
        Ok(())
    }

    async fn update_user(&self, user: &User) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET pattern_hash = $2, display_name = $3, display_name_color = $4, avatar = $5,
                is_admin = $6, genres = $7, favorite_movie_ids = $8, optional_text = $9
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.pattern_hash)
        .bind(&user.display_name)
        .bind(&user.display_name_color)
        .bind(&user.avatar)
        .bind(user.is_admin)
        .bind(&user.preferences.genres)
        .bind(&user.preferences.favorite_movie_ids)
        .bind(&user.preferences.optional_text)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_movie(&self, id: Uuid) -> AppResult<Option<Movie>> {
        let row = sqlx::query_as::<_, MovieRow>(&format!(
            "SELECT {} FROM movies WHERE id = $1",
            MOVIE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Movie::from))
    }

    async fn find_movie_by_tmdb_id(&self, tmdb_id: i64) -> AppResult<Option<Movie>> {
        let row = sqlx::query_as::<_, MovieRow>(&format!(
            "SELECT {} FROM movies WHERE tmdb_id = $1",
            MOVIE_COLUMNS
        ))
        .bind(tmdb_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Movie::from))
    }

    async fn find_movies(&self, ids: &[Uuid]) -> AppResult<Vec<Movie>> {
        let rows = sqlx::query_as::<_, MovieRow>(&format!(
            "SELECT {} FROM movies WHERE id = ANY($1)",
            MOVIE_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Movie::from).collect())
    }

    async fn list_movies(&self) -> AppResult<Vec<Movie>> {
        let rows = sqlx::query_as::<_, MovieRow>(&format!(
            "SELECT {} FROM movies ORDER BY added_at DESC",
            MOVIE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Movie::from).collect())
    }

    async fn insert_movie(&self, movie: &Movie) -> AppResult<(Movie, bool)> {
        let inserted = sqlx::query_as::<_, MovieRow>(&format!(
            r#"
            INSERT INTO movies ({cols})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (tmdb_id) DO NOTHING
            RETURNING {cols}
            "#,
            cols = MOVIE_COLUMNS
        ))
        .bind(movie.id)
        .bind(movie.tmdb_id)
        .bind(&movie.title)
        .bind(&movie.poster)
        .bind(&movie.trailer)
        .bind(&movie.description)
        .bind(&movie.genres)
        .bind(movie.release_date)
        .bind(movie.runtime)
        .bind(movie.added_by)
        .bind(movie.added_at)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(row) => Ok((row.into(), true)),
            None => {
                let existing = self.find_movie_by_tmdb_id(movie.tmdb_id).await?.ok_or_else(|| {
                    AppError::Internal(format!("Movie {} vanished during insert", movie.tmdb_id))
                })?;
                Ok((existing, false))
            }
        }
    }

    async fn find_cycle(&self, id: Uuid) -> AppResult<Option<Cycle>> {
        let row = sqlx::query_as::<_, CycleRow>(&format!(
            "SELECT {} FROM cycles WHERE id = $1",
            CYCLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Cycle::from))
    }

    async fn list_cycles(&self) -> AppResult<Vec<Cycle>> {
        let rows = sqlx::query_as::<_, CycleRow>(&format!(
            "SELECT {} FROM cycles ORDER BY created_at DESC",
            CYCLE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Cycle::from).collect())
    }

    async fn active_cycle(&self) -> AppResult<Option<Cycle>> {
        let row = sqlx::query_as::<_, CycleRow>(&format!(
            "SELECT {} FROM cycles WHERE is_active LIMIT 1",
            CYCLE_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Cycle::from))
    }

    async fn insert_cycle(&self, cycle: &Cycle) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO cycles ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            CYCLE_COLUMNS
        ))
        .bind(cycle.id)
        .bind(cycle.is_active)
        .bind(cycle.start_date)
        .bind(cycle.end_date)
        .bind(cycle.meeting_time)
        .bind(&cycle.location)
        .bind(&cycle.movies)
        .bind(cycle.created_by)
        .bind(cycle.created_at)
        .execute(&self.pool)
        .await
        .map_err(unique_violation(DUPLICATE_ACTIVE_CYCLE))?;
        Ok(())
    }

    async fn update_cycle(&self, cycle: &Cycle) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE cycles
            SET is_active = $2, start_date = $3, end_date = $4, meeting_time = $5,
                location = $6, movies = $7
            WHERE id = $1
            "#,
        )
        .bind(cycle.id)
        .bind(cycle.is_active)
        .bind(cycle.start_date)
        .bind(cycle.end_date)
        .bind(cycle.meeting_time)
        .bind(&cycle.location)
        .bind(&cycle.movies)
        .execute(&self.pool)
        .await
        .map_err(unique_violation(DUPLICATE_ACTIVE_CYCLE))?;
        Ok(())
    }

    async fn deactivate_cycles(&self, keep: Option<Uuid>) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE cycles SET is_active = false WHERE is_active AND ($1::uuid IS NULL OR id <> $1)",
        )
        .bind(keep)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn replace_vote(&self, vote: &Vote) -> AppResult<()> {
        sqlx::query("DELETE FROM votes WHERE user_id = $1 AND movie_id = $2 AND cycle_id = $3")
            .bind(vote.user_id)
            .bind(vote.movie_id)
            .bind(vote.cycle_id)
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO votes (id, user_id, movie_id, cycle_id, vote_type, review, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(vote.id)
        .bind(vote.user_id)
        .bind(vote.movie_id)
        .bind(vote.cycle_id)
        .bind(vote.vote_type.as_str())
        .bind(&vote.review)
        .bind(vote.created_at)
        .execute(&self.pool)
        .await
        .map_err(unique_violation(DUPLICATE_VOTE))?;
        Ok(())
    }

    async fn user_cycle_votes(&self, user_id: Uuid, cycle_id: Uuid) -> AppResult<Vec<Vote>> {
        let rows = sqlx::query_as::<_, VoteRow>(
            r#"
            SELECT id, user_id, movie_id, cycle_id, vote_type, review, created_at
            FROM votes
            WHERE user_id = $1 AND cycle_id = $2
            ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .bind(cycle_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn like_counts(&self, cycle_id: Uuid) -> AppResult<Vec<LikeCount>> {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            r#"
            SELECT movie_id, COUNT(*) AS count
            FROM votes
            WHERE cycle_id = $1 AND vote_type = 'like'
            GROUP BY movie_id
            ORDER BY count DESC
            "#,
        )
        .bind(cycle_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(movie_id, count)| LikeCount { movie_id, count })
            .collect())
    }

    async fn find_meeting(&self, id: Uuid) -> AppResult<Option<Meeting>> {
        let row = sqlx::query_as::<_, MeetingRow>(&format!(
            "SELECT {} FROM meetings WHERE id = $1",
            MEETING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Meeting::try_from).transpose()
    }

    async fn list_meetings(&self) -> AppResult<Vec<Meeting>> {
        let rows = sqlx::query_as::<_, MeetingRow>(&format!(
            "SELECT {} FROM meetings ORDER BY watched_date DESC",
            MEETING_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn insert_meeting(&self, meeting: &Meeting) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO meetings ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            MEETING_COLUMNS
        ))
        .bind(meeting.id)
        .bind(&meeting.movie_ids)
        .bind(&meeting.candidates)
        .bind(meeting.watched_date)
        .bind(meeting.host_id)
        .bind(&meeting.location)
        .bind(&meeting.theme)
        .bind(Json(&meeting.ratings))
        .bind(Json(&meeting.gathering_ratings))
        .bind(Json(&meeting.suggestions))
        .bind(meeting.average_rating)
        .bind(meeting.average_gathering_rating)
        .bind(meeting.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn write_meeting(&self, meeting: &Meeting) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE meetings
            SET movie_ids = $2, candidates = $3, watched_date = $4, host_id = $5, location = $6,
                theme = $7, ratings = $8, gathering_ratings = $9, suggestions = $10,
                average_rating = $11, average_gathering_rating = $12, status = $13
            WHERE id = $1
            "#,
        )
        .bind(meeting.id)
        .bind(&meeting.movie_ids)
        .bind(&meeting.candidates)
        .bind(meeting.watched_date)
        .bind(meeting.host_id)
        .bind(&meeting.location)
        .bind(&meeting.theme)
        .bind(Json(&meeting.ratings))
        .bind(Json(&meeting.gathering_ratings))
        .bind(Json(&meeting.suggestions))
        .bind(meeting.average_rating)
        .bind(meeting.average_gathering_rating)
        .bind(meeting.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_meeting(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM meetings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn meetings_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Meeting>> {
        let rows = sqlx::query_as::<_, MeetingRow>(&format!(
            "SELECT {} FROM meetings WHERE watched_date >= $1 AND watched_date < $2 ORDER BY watched_date",
            MEETING_COLUMNS
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn past_meetings_with_movies(&self, now: DateTime<Utc>) -> AppResult<Vec<Meeting>> {
        let rows = sqlx::query_as::<_, MeetingRow>(&format!(
            r#"
            SELECT {} FROM meetings
            WHERE (status = 'watched' OR watched_date < $1) AND cardinality(movie_ids) > 0
            ORDER BY watched_date DESC
            "#,
            MEETING_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn replace_meeting_vote(&self, vote: &MeetingVote) -> AppResult<()> {
        sqlx::query(
            "DELETE FROM meeting_votes WHERE user_id = $1 AND movie_id = $2 AND meeting_id = $3",
        )
        .bind(vote.user_id)
        .bind(vote.movie_id)
        .bind(vote.meeting_id)
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "INSERT INTO meeting_votes ({}) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            MEETING_VOTE_COLUMNS
        ))
        .bind(vote.id)
        .bind(vote.user_id)
        .bind(vote.movie_id)
        .bind(vote.meeting_id)
        .bind(vote.vote_type.as_str())
        .bind(&vote.reason)
        .bind(vote.created_at)
        .execute(&self.pool)
        .await
        .map_err(unique_violation(DUPLICATE_VOTE))?;
        Ok(())
    }

    async fn meeting_votes(&self, meeting_id: Uuid) -> AppResult<Vec<MeetingVote>> {
        let rows = sqlx::query_as::<_, MeetingVoteRow>(&format!(
            "SELECT {} FROM meeting_votes WHERE meeting_id = $1 ORDER BY created_at",
            MEETING_VOTE_COLUMNS
        ))
        .bind(meeting_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn meeting_votes_in(&self, meeting_ids: &[Uuid]) -> AppResult<Vec<MeetingVote>> {
        let rows = sqlx::query_as::<_, MeetingVoteRow>(&format!(
            "SELECT {} FROM meeting_votes WHERE meeting_id = ANY($1) ORDER BY created_at DESC",
            MEETING_VOTE_COLUMNS
        ))
        .bind(meeting_ids)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn user_meeting_votes(
        &self,
        user_id: Uuid,
        meeting_id: Uuid,
    ) -> AppResult<Vec<MeetingVote>> {
        let rows = sqlx::query_as::<_, MeetingVoteRow>(&format!(
            "SELECT {} FROM meeting_votes WHERE user_id = $1 AND meeting_id = $2 ORDER BY created_at",
            MEETING_VOTE_COLUMNS
        ))
        .bind(user_id)
        .bind(meeting_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn delete_meeting_votes_for_movie(
        &self,
        meeting_id: Uuid,
        movie_id: Uuid,
    ) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM meeting_votes WHERE meeting_id = $1 AND movie_id = $2")
            .bind(meeting_id)
            .bind(movie_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn items_for_event(&self, event_id: Uuid) -> AppResult<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {} FROM items WHERE event_id = $1 ORDER BY name",
            ITEM_COLUMNS
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn find_item(&self, id: Uuid) -> AppResult<Option<Item>> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {} FROM items WHERE id = $1",
            ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Item::try_from).transpose()
    }

    async fn claimed_item(&self, event_id: Uuid, user_id: Uuid) -> AppResult<Option<Item>> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {} FROM items WHERE event_id = $1 AND claimed_by = $2 AND status = 'claimed'",
            ITEM_COLUMNS
        ))
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Item::try_from).transpose()
    }

    async fn insert_item(&self, item: &Item) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO items ({}) VALUES ($1, $2, $3, $4, $5, $6)",
            ITEM_COLUMNS
        ))
        .bind(item.id)
        .bind(item.event_id)
        .bind(&item.name)
        .bind(item.claimed_by)
        .bind(item.claimed_at)
        .bind(item.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_item(&self, item: &Item) -> AppResult<()> {
        sqlx::query(
            "UPDATE items SET name = $2, claimed_by = $3, claimed_at = $4, status = $5 WHERE id = $1",
        )
        .bind(item.id)
        .bind(&item.name)
        .bind(item.claimed_by)
        .bind(item.claimed_at)
        .bind(item.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(unique_violation(DUPLICATE_CLAIM))?;
        Ok(())
    }

    async fn delete_item(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn free_evenings_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<FreeEvening>> {
        let rows = sqlx::query_as::<_, FreeEveningRow>(
            r#"
            SELECT id, user_id, date, created_at FROM free_evenings
            WHERE date BETWEEN $1 AND $2
            ORDER BY date, created_at
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(FreeEvening::from).collect())
    }

    async fn user_free_evenings_between(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<FreeEvening>> {
        let rows = sqlx::query_as::<_, FreeEveningRow>(
            r#"
            SELECT id, user_id, date, created_at FROM free_evenings
            WHERE user_id = $1 AND date BETWEEN $2 AND $3
            ORDER BY date
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(FreeEvening::from).collect())
    }

    async fn insert_free_evening(&self, evening: &FreeEvening) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO free_evenings (id, user_id, date, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(evening.id)
        .bind(evening.user_id)
        .bind(evening.date)
        .bind(evening.created_at)
        .execute(&self.pool)
        .await
        .map_err(unique_violation(DUPLICATE_FREE_EVENING))?;
        Ok(())
    }

    async fn delete_free_evening(&self, user_id: Uuid, date: NaiveDate) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM free_evenings WHERE user_id = $1 AND date = $2")
            .bind(user_id)
            .bind(date)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
