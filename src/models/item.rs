use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::UserSummary;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Available,
    Claimed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Available => "available",
            ItemStatus::Claimed => "claimed",
        }
    }
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(ItemStatus::Available),
            "claimed" => Ok(ItemStatus::Claimed),
            other => Err(format!("unknown item status: {}", other)),
        }
    }
}

/// Something a member brings to a meeting
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub claimed_by: Option<Uuid>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub status: ItemStatus,
}

/// Outcome of toggling a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimChange {
    Claimed,
    Released,
}

/// Why a claim toggle was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimError {
    ClaimedByOther,
    AlreadyHoldsItem,
}

impl ClaimError {
    pub fn message(&self) -> &'static str {
        match self {
            ClaimError::ClaimedByOther => "Item already claimed by someone else",
            ClaimError::AlreadyHoldsItem => "You can only claim one item per event",
        }
    }
}

impl Item {
    pub fn new(event_id: Uuid, name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            name: name.trim().to_string(),
            claimed_by: None,
            claimed_at: None,
            status: ItemStatus::Available,
        }
    }

    /// Claims the item for `user_id`, or releases it when that user already
    /// holds it. `holds_other` tells whether the user holds a different item
    /// of the same event.
    pub fn toggle_claim(
        &mut self,
        user_id: Uuid,
        holds_other: bool,
        now: DateTime<Utc>,
    ) -> Result<ClaimChange, ClaimError> {
        match (self.status, self.claimed_by) {
            (ItemStatus::Claimed, Some(holder)) if holder == user_id => {
                self.status = ItemStatus::Available;
                self.claimed_by = None;
                self.claimed_at = None;
                Ok(ClaimChange::Released)
            }
            (ItemStatus::Available, _) => {
                if holds_other {
                    return Err(ClaimError::AlreadyHoldsItem);
                }
                self.status = ItemStatus::Claimed;
                self.claimed_by = Some(user_id);
                self.claimed_at = Some(now);
                Ok(ClaimChange::Claimed)
            }
            _ => Err(ClaimError::ClaimedByOther),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemView {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub claimed_by: Option<UserSummary>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub status: ItemStatus,
}
