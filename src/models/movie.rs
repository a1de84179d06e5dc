use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A movie known to the group, keyed by its TMDB identifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: Uuid,
    pub tmdb_id: i64,
    pub title: String,
    pub poster: String,
    pub trailer: Option<String>,
    pub description: String,
    pub genres: Vec<String>,
    pub release_date: Option<NaiveDate>,
    pub runtime: Option<i32>,
    /// `None` when the movie was created by the AI suggester
    pub added_by: Option<Uuid>,
    pub added_at: DateTime<Utc>,
}

/// Metadata fetched from TMDB, before it is stored
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MovieDetails {
    pub tmdb_id: i64,
    pub title: String,
    pub poster: String,
    pub trailer: Option<String>,
    pub description: String,
    pub genres: Vec<String>,
    pub release_date: Option<NaiveDate>,
    pub runtime: Option<i32>,
}

impl Movie {
    pub fn from_details(details: MovieDetails, added_by: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tmdb_id: details.tmdb_id,
            title: details.title,
            poster: details.poster,
            trailer: details.trailer,
            description: details.description,
            genres: details.genres,
            release_date: details.release_date,
            runtime: details.runtime,
            added_by,
            added_at: Utc::now(),
        }
    }
}

/// One hit from a title search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MovieSearchResult {
    pub id: i64,
    pub title: String,
    pub overview: String,
    pub poster: Option<String>,
    pub release_date: Option<String>,
    pub genre_ids: Vec<i64>,
}

/// A page of search results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MovieSearchPage {
    pub results: Vec<MovieSearchResult>,
    pub total_results: i64,
    pub total_pages: i64,
    pub page: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details() -> MovieDetails {
        MovieDetails {
            tmdb_id: 27205,
            title: "Inception".to_string(),
            poster: "https://image.tmdb.org/t/p/w500/inception.jpg".to_string(),
            trailer: None,
            description: "A thief who steals corporate secrets".to_string(),
            genres: vec!["Action".to_string(), "Science Fiction".to_string()],
            release_date: NaiveDate::from_ymd_opt(2010, 7, 15),
            runtime: Some(148),
        }
    }

    #[test]
    fn test_from_details_keeps_metadata() {
        let adder = Uuid::new_v4();
        let movie = Movie::from_details(details(), Some(adder));
        assert_eq!(movie.tmdb_id, 27205);
        assert_eq!(movie.title, "Inception");
        assert_eq!(movie.added_by, Some(adder));
        assert_eq!(movie.runtime, Some(148));
    }

    #[test]
    fn test_movie_serializes_camel_case() {
        let movie = Movie::from_details(details(), None);
        let json = serde_json::to_value(&movie).unwrap();
        assert_eq!(json["tmdbId"], 27205);
        assert_eq!(json["releaseDate"], "2010-07-15");
        assert!(json["addedBy"].is_null());
    }
}
