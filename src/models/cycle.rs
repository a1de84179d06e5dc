use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use uuid::Uuid;

use super::{Movie, UserSummary};

/// A voting round over a fixed set of movies
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Cycle {
    pub id: Uuid,
    pub is_active: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub meeting_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub movies: Vec<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Cycle {
    pub fn contains_movie(&self, movie_id: &Uuid) -> bool {
        self.movies.contains(movie_id)
    }

    /// Whether `now` lies inside the voting window
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_date && now <= self.end_date
    }
}

/// Cycle with its movies and creator resolved
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleView {
    pub id: Uuid,
    pub is_active: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub meeting_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub movies: Vec<Movie>,
    pub created_by: Option<UserSummary>,
    pub created_at: DateTime<Utc>,
}

/// Movie annotated with the number of likes it got in a cycle
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieWithLikes {
    #[serde(flatten)]
    pub movie: Movie,
    pub like_count: i64,
}

/// The active cycle as shown on the voting screen
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCycleView {
    pub id: Uuid,
    pub is_active: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub meeting_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub movies: Vec<MovieWithLikes>,
    pub created_by: Option<UserSummary>,
    pub created_at: DateTime<Utc>,
}

/// Like/dislike vote on a cycle movie
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Like,
    Dislike,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Like => "like",
            VoteType::Dislike => "dislike",
        }
    }
}

impl Display for VoteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(VoteType::Like),
            "dislike" => Ok(VoteType::Dislike),
            other => Err(format!("unknown vote type: {}", other)),
        }
    }
}

/// One user's vote on one movie of one cycle
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: Uuid,
    pub user_id: Uuid,
    pub movie_id: Uuid,
    pub cycle_id: Uuid,
    pub vote_type: VoteType,
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Number of likes a movie collected
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LikeCount {
    pub movie_id: Uuid,
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn cycle(start: DateTime<Utc>, end: DateTime<Utc>) -> Cycle {
        Cycle {
            id: Uuid::new_v4(),
            is_active: true,
            start_date: start,
            end_date: end,
            meeting_time: None,
            location: None,
            movies: vec![],
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_voting_window() {
        let now = Utc::now();
        let c = cycle(now - Duration::days(1), now + Duration::days(1));
        assert!(c.is_open_at(now));
        assert!(!c.is_open_at(now + Duration::days(2)));
        assert!(!c.is_open_at(now - Duration::days(2)));
    }

    #[test]
    fn test_vote_type_parse() {
        assert_eq!("like".parse::<VoteType>(), Ok(VoteType::Like));
        assert_eq!("dislike".parse::<VoteType>(), Ok(VoteType::Dislike));
        assert!("meh".parse::<VoteType>().is_err());
    }

    #[test]
    fn test_movie_with_likes_flattens() {
        let movie = Movie {
            id: Uuid::new_v4(),
            tmdb_id: 603,
            title: "The Matrix".to_string(),
            poster: "p".to_string(),
            trailer: None,
            description: "d".to_string(),
            genres: vec![],
            release_date: None,
            runtime: None,
            added_by: None,
            added_at: Utc::now(),
        };
        let json = serde_json::to_value(MovieWithLikes {
            movie,
            like_count: 3,
        })
        .unwrap();
        assert_eq!(json["title"], "The Matrix");
        assert_eq!(json["likeCount"], 3);
    }
}
