use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::UserSummary;

/// A member's availability on one evening
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FreeEvening {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl FreeEvening {
    pub fn new(user_id: Uuid, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            date,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeEveningView {
    pub id: Uuid,
    pub user: Option<UserSummary>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// One day of the upcoming week
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekDay {
    pub date: NaiveDate,
    pub has_meeting: bool,
    pub free_users: Vec<FreeEveningView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingWeek {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub dates: Vec<WeekDay>,
}
