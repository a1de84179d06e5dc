use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    db::store::{
        Store, DUPLICATE_ACTIVE_CYCLE, DUPLICATE_CLAIM, DUPLICATE_FREE_EVENING,
        DUPLICATE_USERNAME,
    },
    error::{AppError, AppResult},
    models::{Cycle, FreeEvening, Item, LikeCount, Meeting, MeetingVote, Movie, User, Vote, VoteType},
};

/// In-process [`Store`] used for tests and local runs without PostgreSQL
///
/// Applies the same uniqueness rules as the SQL schema.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    users: HashMap<Uuid, User>,
    movies: HashMap<Uuid, Movie>,
    cycles: HashMap<Uuid, Cycle>,
    votes: HashMap<Uuid, Vote>,
    meetings: HashMap<Uuid, Meeting>,
    meeting_votes: HashMap<Uuid, MeetingVote>,
    items: HashMap<Uuid, Item>,
    free_evenings: HashMap<Uuid, FreeEvening>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T, K: Ord>(mut values: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    values.sort_by(|a, b| key(b).cmp(&key(a)));
    values
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let wanted = username.trim().to_lowercase();
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.username.to_lowercase() == wanted)
            .cloned())
    }

    async fn find_users(&self, ids: &[Uuid]) -> AppResult<Vec<User>> {
        let inner = self.inner.read().await;
        Ok(ids.iter().filter_map(|id| inner.users.get(id).cloned()).collect())
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let users = self.inner.read().await.users.values().cloned().collect();
        Ok(newest_first(users, |u: &User| u.created_at))
    }

    async fn insert_user(&self, user: &User) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let wanted = user.username.to_lowercase();
        if inner.users.values().any(|u| u.username.to_lowercase() == wanted) {
            return Err(AppError::Conflict(DUPLICATE_USERNAME.to_string()));
        }
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.users.get_mut(&user.id) {
            *existing = user.clone();
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.inner.write().await.users.remove(&id).is_some())
    }

    async fn find_movie(&self, id: Uuid) -> AppResult<Option<Movie>> {
        Ok(self.inner.read().await.movies.get(&id).cloned())
    }

    async fn find_movie_by_tmdb_id(&self, tmdb_id: i64) -> AppResult<Option<Movie>> {
        let inner = self.inner.read().await;
        Ok(inner.movies.values().find(|m| m.tmdb_id == tmdb_id).cloned())
    }

    async fn find_movies(&self, ids: &[Uuid]) -> AppResult<Vec<Movie>> {
        let inner = self.inner.read().await;
        Ok(ids.iter().filter_map(|id| inner.movies.get(id).cloned()).collect())
    }

    async fn list_movies(&self) -> AppResult<Vec<Movie>> {
        let movies = self.inner.read().await.movies.values().cloned().collect();
        Ok(newest_first(movies, |m: &Movie| m.added_at))
    }

    async fn insert_movie(&self, movie: &Movie) -> AppResult<(Movie, bool)> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.movies.values().find(|m| m.tmdb_id == movie.tmdb_id) {
            return Ok((existing.clone(), false));
        }
        inner.movies.insert(movie.id, movie.clone());
        Ok((movie.clone(), true))
    }

    async fn find_cycle(&self, id: Uuid) -> AppResult<Option<Cycle>> {
        Ok(self.inner.read().await.cycles.get(&id).cloned())
    }

    async fn list_cycles(&self) -> AppResult<Vec<Cycle>> {
        let cycles = self.inner.read().await.cycles.values().cloned().collect();
        Ok(newest_first(cycles, |c: &Cycle| c.created_at))
    }

    async fn active_cycle(&self) -> AppResult<Option<Cycle>> {
        let inner = self.inner.read().await;
        Ok(inner.cycles.values().find(|c| c.is_active).cloned())
    }

    async fn insert_cycle(&self, cycle: &Cycle) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if cycle.is_active && inner.cycles.values().any(|c| c.is_active) {
            return Err(AppError::Conflict(DUPLICATE_ACTIVE_CYCLE.to_string()));
        }
        inner.cycles.insert(cycle.id, cycle.clone());
        Ok(())
    }

    async fn update_cycle(&self, cycle: &Cycle) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if cycle.is_active
            && inner
                .cycles
                .values()
                .any(|c| c.is_active && c.id != cycle.id)
        {
            return Err(AppError::Conflict(DUPLICATE_ACTIVE_CYCLE.to_string()));
        }
        if let Some(existing) = inner.cycles.get_mut(&cycle.id) {
            *existing = cycle.clone();
        }
        Ok(())
    }

    async fn deactivate_cycles(&self, keep: Option<Uuid>) -> AppResult<u64> {
        let mut inner = self.inner.write().await;
        let mut changed = 0;
        for cycle in inner.cycles.values_mut() {
            if cycle.is_active && Some(cycle.id) != keep {
                cycle.is_active = false;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn replace_vote(&self, vote: &Vote) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.votes.retain(|_, v| {
            !(v.user_id == vote.user_id
                && v.movie_id == vote.movie_id
                && v.cycle_id == vote.cycle_id)
        });
        inner.votes.insert(vote.id, vote.clone());
        Ok(())
    }

    async fn user_cycle_votes(&self, user_id: Uuid, cycle_id: Uuid) -> AppResult<Vec<Vote>> {
        let inner = self.inner.read().await;
        let mut votes: Vec<Vote> = inner
            .votes
            .values()
            .filter(|v| v.user_id == user_id && v.cycle_id == cycle_id)
            .cloned()
            .collect();
        votes.sort_by_key(|v| v.created_at);
        Ok(votes)
    }

    async fn like_counts(&self, cycle_id: Uuid) -> AppResult<Vec<LikeCount>> {
        let inner = self.inner.read().await;
        let mut counts: HashMap<Uuid, i64> = HashMap::new();
        for vote in inner
            .votes
            .values()
            .filter(|v| v.cycle_id == cycle_id && v.vote_type == VoteType::Like)
        {
            *counts.entry(vote.movie_id).or_default() += 1;
        }
        let mut counts: Vec<LikeCount> = counts
            .into_iter()
            .map(|(movie_id, count)| LikeCount { movie_id, count })
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count).then(a.movie_id.cmp(&b.movie_id)));
        Ok(counts)
    }

    async fn find_meeting(&self, id: Uuid) -> AppResult<Option<Meeting>> {
        Ok(self.inner.read().await.meetings.get(&id).cloned())
    }

    async fn list_meetings(&self) -> AppResult<Vec<Meeting>> {
        let meetings = self.inner.read().await.meetings.values().cloned().collect();
        Ok(newest_first(meetings, |m: &Meeting| m.watched_date))
    }

    async fn insert_meeting(&self, meeting: &Meeting) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.meetings.insert(meeting.id, meeting.clone());
        Ok(())
    }

    async fn write_meeting(&self, meeting: &Meeting) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.meetings.get_mut(&meeting.id) {
            *existing = meeting.clone();
        }
        Ok(())
    }

    async fn delete_meeting(&self, id: Uuid) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        let removed = inner.meetings.remove(&id).is_some();
        if removed {
            inner.meeting_votes.retain(|_, v| v.meeting_id != id);
            inner.items.retain(|_, i| i.event_id != id);
        }
        Ok(removed)
    }

    async fn meetings_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Meeting>> {
        let inner = self.inner.read().await;
        let mut meetings: Vec<Meeting> = inner
            .meetings
            .values()
            .filter(|m| m.watched_date >= start && m.watched_date < end)
            .cloned()
            .collect();
        meetings.sort_by_key(|m| m.watched_date);
        Ok(meetings)
    }

    async fn past_meetings_with_movies(&self, now: DateTime<Utc>) -> AppResult<Vec<Meeting>> {
        let inner = self.inner.read().await;
        let meetings = inner
            .meetings
            .values()
            .filter(|m| m.is_past(now) && !m.movie_ids.is_empty())
            .cloned()
            .collect();
        Ok(newest_first(meetings, |m: &Meeting| m.watched_date))
    }

    async fn replace_meeting_vote(&self, vote: &MeetingVote) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.meeting_votes.retain(|_, v| {
            !(v.user_id == vote.user_id
                && v.movie_id == vote.movie_id
                && v.meeting_id == vote.meeting_id)
        });
        inner.meeting_votes.insert(vote.id, vote.clone());
        Ok(())
    }

    async fn meeting_votes(&self, meeting_id: Uuid) -> AppResult<Vec<MeetingVote>> {
        let inner = self.inner.read().await;
        let mut votes: Vec<MeetingVote> = inner
            .meeting_votes
            .values()
            .filter(|v| v.meeting_id == meeting_id)
            .cloned()
            .collect();
        votes.sort_by_key(|v| v.created_at);
        Ok(votes)
    }

    async fn meeting_votes_in(&self, meeting_ids: &[Uuid]) -> AppResult<Vec<MeetingVote>> {
        let inner = self.inner.read().await;
        let votes = inner
            .meeting_votes
            .values()
            .filter(|v| meeting_ids.contains(&v.meeting_id))
            .cloned()
            .collect();
        Ok(newest_first(votes, |v: &MeetingVote| v.created_at))
    }

    async fn user_meeting_votes(
        &self,
        user_id: Uuid,
        meeting_id: Uuid,
    ) -> AppResult<Vec<MeetingVote>> {
        let inner = self.inner.read().await;
        let mut votes: Vec<MeetingVote> = inner
            .meeting_votes
            .values()
            .filter(|v| v.user_id == user_id && v.meeting_id == meeting_id)
            .cloned()
            .collect();
        votes.sort_by_key(|v| v.created_at);
        Ok(votes)
    }

    async fn delete_meeting_votes_for_movie(
        &self,
        meeting_id: Uuid,
        movie_id: Uuid,
    ) -> AppResult<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.meeting_votes.len();
        inner
            .meeting_votes
            .retain(|_, v| !(v.meeting_id == meeting_id && v.movie_id == movie_id));
        Ok((before - inner.meeting_votes.len()) as u64)
    }

    async fn items_for_event(&self, event_id: Uuid) -> AppResult<Vec<Item>> {
        let inner = self.inner.read().await;
        let mut items: Vec<Item> = inner
            .items
            .values()
            .filter(|i| i.event_id == event_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn find_item(&self, id: Uuid) -> AppResult<Option<Item>> {
        Ok(self.inner.read().await.items.get(&id).cloned())
    }

    async fn claimed_item(&self, event_id: Uuid, user_id: Uuid) -> AppResult<Option<Item>> {
        let inner = self.inner.read().await;
        Ok(inner
            .items
            .values()
            .find(|i| i.event_id == event_id && i.claimed_by == Some(user_id))
            .cloned())
    }

    async fn insert_item(&self, item: &Item) -> AppResult<()> {
        self.inner.write().await.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn update_item(&self, item: &Item) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(holder) = item.claimed_by {
            let holds_other = inner.items.values().any(|i| {
                i.id != item.id && i.event_id == item.event_id && i.claimed_by == Some(holder)
            });
            if holds_other {
                return Err(AppError::Conflict(DUPLICATE_CLAIM.to_string()));
            }
        }
        if let Some(existing) = inner.items.get_mut(&item.id) {
            *existing = item.clone();
        }
        Ok(())
    }

    async fn delete_item(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.inner.write().await.items.remove(&id).is_some())
    }

    async fn free_evenings_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<FreeEvening>> {
        let inner = self.inner.read().await;
        let mut evenings: Vec<FreeEvening> = inner
            .free_evenings
            .values()
            .filter(|e| e.date >= start && e.date <= end)
            .cloned()
            .collect();
        evenings.sort_by_key(|e| (e.date, e.created_at));
        Ok(evenings)
    }

    async fn user_free_evenings_between(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<Vec<FreeEvening>> {
        let mut evenings = self.free_evenings_between(start, end).await?;
        evenings.retain(|e| e.user_id == user_id);
        Ok(evenings)
    }

    async fn insert_free_evening(&self, evening: &FreeEvening) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if inner
            .free_evenings
            .values()
            .any(|e| e.user_id == evening.user_id && e.date == evening.date)
        {
            return Err(AppError::Conflict(DUPLICATE_FREE_EVENING.to_string()));
        }
        inner.free_evenings.insert(evening.id, evening.clone());
        Ok(())
    }

    async fn delete_free_evening(&self, user_id: Uuid, date: NaiveDate) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.free_evenings.len();
        inner
            .free_evenings
            .retain(|_, e| !(e.user_id == user_id && e.date == date));
        Ok(inner.free_evenings.len() < before)
    }
}
