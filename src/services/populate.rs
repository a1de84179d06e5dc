use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    db::Store,
    error::AppResult,
    models::{
        Cycle, CycleView, FreeEvening, FreeEveningView, GatheringRatingView, Item, ItemView,
        Meeting, MeetingView, MeetingVote, MeetingVoteView, Movie, RatingView, User, UserSummary,
    },
};

/// Users and movies fetched in bulk so records can be rendered with their
/// references resolved
///
/// Dangling references render as `None` or are left out of lists.
#[derive(Default)]
pub struct Lookup {
    users: HashMap<Uuid, User>,
    movies: HashMap<Uuid, Movie>,
}

fn unique(mut ids: Vec<Uuid>) -> Vec<Uuid> {
    ids.sort();
    ids.dedup();
    ids
}

impl Lookup {
    pub async fn load(
        store: &dyn Store,
        user_ids: Vec<Uuid>,
        movie_ids: Vec<Uuid>,
    ) -> AppResult<Self> {
        let user_ids = unique(user_ids);
        let movie_ids = unique(movie_ids);

        let users = if user_ids.is_empty() {
            HashMap::new()
        } else {
            store
                .find_users(&user_ids)
                .await?
                .into_iter()
                .map(|u| (u.id, u))
                .collect()
        };
        let movies = if movie_ids.is_empty() {
            HashMap::new()
        } else {
            store
                .find_movies(&movie_ids)
                .await?
                .into_iter()
                .map(|m| (m.id, m))
                .collect()
        };

        Ok(Self { users, movies })
    }

    /// Everything referenced by a set of meetings
    pub async fn for_meetings(store: &dyn Store, meetings: &[Meeting]) -> AppResult<Self> {
        let users = meetings.iter().flat_map(|m| m.user_refs()).collect();
        let movies = meetings.iter().flat_map(|m| m.movie_refs()).collect();
        Self::load(store, users, movies).await
    }

    #[cfg(test)]
    pub fn insert_movie(&mut self, movie: Movie) {
        self.movies.insert(movie.id, movie);
    }

    pub fn users(&self) -> &HashMap<Uuid, User> {
        &self.users
    }

    pub fn user(&self, id: &Uuid) -> Option<UserSummary> {
        self.users.get(id).map(UserSummary::from)
    }

    pub fn movie(&self, id: &Uuid) -> Option<Movie> {
        self.movies.get(id).cloned()
    }

    /// Keeps the order of `ids`
    pub fn movies(&self, ids: &[Uuid]) -> Vec<Movie> {
        ids.iter().filter_map(|id| self.movie(id)).collect()
    }

    pub fn meeting(&self, meeting: &Meeting) -> MeetingView {
        MeetingView {
            id: meeting.id,
            movies: self.movies(&meeting.movie_ids),
            candidates: self.movies(&meeting.candidates),
            watched_date: meeting.watched_date,
            host: self.user(&meeting.host_id),
            location: meeting.location.clone(),
            theme: meeting.theme.clone(),
            ratings: meeting
                .ratings
                .iter()
                .map(|r| RatingView {
                    id: r.id,
                    user: self.user(&r.user_id),
                    movie: r.movie_id.and_then(|m| self.movie(&m)),
                    rating: r.rating,
                    comment: r.comment.clone(),
                })
                .collect(),
            gathering_ratings: meeting
                .gathering_ratings
                .iter()
                .map(|r| GatheringRatingView {
                    id: r.id,
                    user: self.user(&r.user_id),
                    rating: r.rating,
                    comment: r.comment.clone(),
                })
                .collect(),
            suggestions: meeting.suggestions.clone(),
            average_rating: meeting.average_rating,
            average_gathering_rating: meeting.average_gathering_rating,
            status: meeting.status,
        }
    }

    pub fn cycle(&self, cycle: &Cycle) -> CycleView {
        CycleView {
            id: cycle.id,
            is_active: cycle.is_active,
            start_date: cycle.start_date,
            end_date: cycle.end_date,
            meeting_time: cycle.meeting_time,
            location: cycle.location.clone(),
            movies: self.movies(&cycle.movies),
            created_by: self.user(&cycle.created_by),
            created_at: cycle.created_at,
        }
    }

    pub fn meeting_vote(&self, vote: &MeetingVote) -> MeetingVoteView {
        MeetingVoteView {
            id: vote.id,
            user: self.user(&vote.user_id),
            movie: self.movie(&vote.movie_id),
            meeting_id: vote.meeting_id,
            vote_type: vote.vote_type,
            reason: vote.reason.clone(),
            created_at: vote.created_at,
        }
    }

    pub fn item(&self, item: &Item) -> ItemView {
        ItemView {
            id: item.id,
            event_id: item.event_id,
            name: item.name.clone(),
            claimed_by: item.claimed_by.and_then(|u| self.user(&u)),
            claimed_at: item.claimed_at,
            status: item.status,
        }
    }

    pub fn free_evening(&self, evening: &FreeEvening) -> FreeEveningView {
        FreeEveningView {
            id: evening.id,
            user: self.user(&evening.user_id),
            date: evening.date,
            created_at: evening.created_at,
        }
    }
}

/// Renders meetings with every reference resolved
pub async fn meeting_views(store: &dyn Store, meetings: &[Meeting]) -> AppResult<Vec<MeetingView>> {
    let lookup = Lookup::for_meetings(store, meetings).await?;
    Ok(meetings.iter().map(|m| lookup.meeting(m)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::MemoryStore, models::MovieDetails};
    use chrono::Utc;

    #[tokio::test]
    async fn test_meeting_view_resolves_references() {
        let store = MemoryStore::new();
        let host = User::new("host");
        store.insert_user(&host).await.unwrap();
        let (movie, _) = store
            .insert_movie(&Movie::from_details(
                MovieDetails {
                    tmdb_id: 1,
                    title: "Heat".to_string(),
                    poster: "p".to_string(),
                    trailer: None,
                    description: String::new(),
                    genres: vec![],
                    release_date: None,
                    runtime: None,
                },
                None,
            ))
            .await
            .unwrap();

        let now = Utc::now();
        let deleted_movie = Uuid::new_v4();
        let mut meeting = Meeting::new(now, host.id, vec![movie.id, deleted_movie], now);
        meeting.upsert_gathering_rating(Uuid::new_v4(), 4, None);

        let views = meeting_views(&store, &[meeting]).await.unwrap();
        let view = &views[0];
        assert_eq!(view.movies.len(), 1);
        assert_eq!(view.movies[0].title, "Heat");
        assert_eq!(view.host.as_ref().map(|h| h.username.as_str()), Some("host"));
        assert!(view.gathering_ratings[0].user.is_none());
    }
}
