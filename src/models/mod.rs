use chrono::NaiveDate;
use serde::Deserialize;

pub mod cycle;
pub mod free_evening;
pub mod item;
pub mod meeting;
pub mod movie;
pub mod user;

pub use cycle::{ActiveCycleView, Cycle, CycleView, LikeCount, MovieWithLikes, Vote, VoteType};
pub use free_evening::{FreeEvening, FreeEveningView, UpcomingWeek, WeekDay};
pub use item::{ClaimChange, ClaimError, Item, ItemStatus, ItemView};
pub use meeting::{
    GatheringRating, GatheringRatingView, Meeting, MeetingStatus, MeetingView, MeetingVote,
    MeetingVoteType, MeetingVoteView, Rating, RatingView, Suggestion,
};
pub use movie::{Movie, MovieDetails, MovieSearchPage, MovieSearchResult};
pub use user::{AdminUserSummary, Preferences, User, UserProfile, UserSummary};

pub const TMDB_IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/w500";
pub const POSTER_PLACEHOLDER: &str = "https://via.placeholder.com/500x750?text=No+Poster";

// ============================================================================
// TMDB API Types
// ============================================================================

/// Raw search hit from GET /search/movie
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovie {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub genre_ids: Vec<i64>,
}

/// Raw response from GET /search/movie
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbSearchResponse {
    #[serde(default)]
    pub results: Vec<TmdbMovie>,
    #[serde(default)]
    pub total_results: i64,
    #[serde(default)]
    pub total_pages: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbGenre {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbVideo {
    pub key: String,
    #[serde(rename = "type")]
    pub video_type: String,
    pub site: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TmdbVideos {
    #[serde(default)]
    pub results: Vec<TmdbVideo>,
}

/// Raw response from GET /movie/{id}?append_to_response=videos
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovieDetails {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub genres: Vec<TmdbGenre>,
    #[serde(default)]
    pub runtime: Option<i32>,
    #[serde(default)]
    pub videos: TmdbVideos,
}

/// Full poster URL, or the placeholder when TMDB has no artwork
pub fn poster_url(poster_path: Option<&str>) -> String {
    match poster_path {
        Some(path) if !path.is_empty() => format!("{}{}", TMDB_IMAGE_BASE_URL, path),
        _ => POSTER_PLACEHOLDER.to_string(),
    }
}

impl TmdbMovieDetails {
    /// First YouTube trailer, as a watch URL
    pub fn trailer_url(&self) -> Option<String> {
        self.videos
            .results
            .iter()
            .find(|v| v.site == "YouTube" && v.video_type == "Trailer")
            .map(|v| format!("https://www.youtube.com/watch?v={}", v.key))
    }
}

/// TMDB sends "" for unknown dates
fn parse_release_date(raw: Option<&str>) -> Option<NaiveDate> {
    raw.and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

impl From<TmdbMovieDetails> for MovieDetails {
    fn from(details: TmdbMovieDetails) -> Self {
        let trailer = details.trailer_url();
        MovieDetails {
            tmdb_id: details.id,
            poster: poster_url(details.poster_path.as_deref()),
            release_date: parse_release_date(details.release_date.as_deref()),
            title: details.title,
            trailer,
            description: details.overview.unwrap_or_default(),
            genres: details.genres.into_iter().map(|g| g.name).collect(),
            runtime: details.runtime.filter(|r| *r > 0),
        }
    }
}

impl From<TmdbMovie> for MovieSearchResult {
    fn from(movie: TmdbMovie) -> Self {
        MovieSearchResult {
            id: movie.id,
            title: movie.title,
            overview: movie.overview.unwrap_or_default(),
            poster: movie
                .poster_path
                .filter(|p| !p.is_empty())
                .map(|p| format!("{}{}", TMDB_IMAGE_BASE_URL, p)),
            release_date: movie.release_date,
            genre_ids: movie.genre_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAILS_JSON: &str = r#"{
        "id": 27205,
        "title": "Inception",
        "overview": "Cobb steals secrets from dreams.",
        "poster_path": "/oYuLEt3zVCKq57qu2F8dT7NIa6f.jpg",
        "release_date": "2010-07-15",
        "genres": [{"id": 28, "name": "Action"}, {"id": 878, "name": "Science Fiction"}],
        "runtime": 148,
        "videos": {"results": [
            {"key": "abc", "type": "Teaser", "site": "YouTube"},
            {"key": "vimeo1", "type": "Trailer", "site": "Vimeo"},
            {"key": "YoHD9XEInc0", "type": "Trailer", "site": "YouTube"}
        ]}
    }"#;

    #[test]
    fn test_details_to_movie_details() {
        let raw: TmdbMovieDetails = serde_json::from_str(DETAILS_JSON).unwrap();
        let details: MovieDetails = raw.into();
        assert_eq!(details.tmdb_id, 27205);
        assert_eq!(
            details.poster,
            "https://image.tmdb.org/t/p/w500/oYuLEt3zVCKq57qu2F8dT7NIa6f.jpg"
        );
        assert_eq!(
            details.trailer.as_deref(),
            Some("https://www.youtube.com/watch?v=YoHD9XEInc0")
        );
        assert_eq!(details.genres, vec!["Action", "Science Fiction"]);
        assert_eq!(details.release_date, NaiveDate::from_ymd_opt(2010, 7, 15));
        assert_eq!(details.runtime, Some(148));
    }

    #[test]
    fn test_missing_poster_uses_placeholder() {
        let raw: TmdbMovieDetails = serde_json::from_str(
            r#"{"id": 1, "title": "Lost Film", "poster_path": null, "release_date": "", "runtime": 0}"#,
        )
        .unwrap();
        let details: MovieDetails = raw.into();
        assert_eq!(details.poster, POSTER_PLACEHOLDER);
        assert_eq!(details.release_date, None);
        assert_eq!(details.runtime, None);
        assert_eq!(details.trailer, None);
        assert_eq!(details.description, "");
    }

    #[test]
    fn test_search_hit_conversion() {
        let raw: TmdbSearchResponse = serde_json::from_str(
            r#"{"page": 1, "results": [{"id": 603, "title": "The Matrix", "overview": "Neo",
                "poster_path": "/m.jpg", "release_date": "1999-03-30", "genre_ids": [28, 878]},
                {"id": 604, "title": "No Art", "poster_path": null}],
                "total_results": 2, "total_pages": 1}"#,
        )
        .unwrap();
        let hits: Vec<MovieSearchResult> = raw.results.into_iter().map(Into::into).collect();
        assert_eq!(hits[0].poster.as_deref(), Some("https://image.tmdb.org/t/p/w500/m.jpg"));
        assert_eq!(hits[0].genre_ids, vec![28, 878]);
        assert_eq!(hits[1].poster, None);
        assert_eq!(hits[1].overview, "");
    }
}
