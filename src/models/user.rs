use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_DISPLAY_NAME_COLOR: &str = "#000000";

/// Taste profile collected during onboarding
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub genres: Vec<String>,
    /// TMDB identifiers
    #[serde(default)]
    pub favorite_movie_ids: Vec<i64>,
    #[serde(default)]
    pub optional_text: Option<String>,
}

/// A member of the movie-night group
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip)]
    pub pattern_hash: Option<String>,
    pub display_name: Option<String>,
    pub display_name_color: String,
    pub avatar: Option<String>,
    pub is_admin: bool,
    pub preferences: Preferences,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Creates a user without a pattern; the pattern is set on first login
    pub fn new(username: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.trim().to_string(),
            pattern_hash: None,
            display_name: None,
            display_name_color: DEFAULT_DISPLAY_NAME_COLOR.to_string(),
            avatar: None,
            is_admin: false,
            preferences: Preferences::default(),
            created_at: Utc::now(),
        }
    }

    pub fn has_pattern(&self) -> bool {
        self.pattern_hash.is_some()
    }

    /// True until the user has picked at least one genre or favorite movie
    pub fn needs_onboarding(&self) -> bool {
        self.preferences.genres.is_empty() && self.preferences.favorite_movie_ids.is_empty()
    }

    /// Name shown to other members
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

/// Public fields used wherever a user is referenced from another record
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub display_name_color: String,
    pub avatar: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            display_name_color: user.display_name_color.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

/// The caller's own account as returned by login and `/me`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub display_name_color: String,
    pub avatar: Option<String>,
    pub is_admin: bool,
    pub preferences: Preferences,
    pub needs_onboarding: bool,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            display_name_color: user.display_name_color.clone(),
            avatar: user.avatar.clone(),
            is_admin: user.is_admin,
            preferences: user.preferences.clone(),
            needs_onboarding: user.needs_onboarding(),
        }
    }
}

/// Row in the admin user list
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserSummary {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub display_name_color: String,
    pub avatar: Option<String>,
    pub has_pattern: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for AdminUserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            display_name_color: user.display_name_color.clone(),
            avatar: user.avatar.clone(),
            has_pattern: user.has_pattern(),
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_trims_and_defaults() {
        let user = User::new("  alice ");
        assert_eq!(user.username, "alice");
        assert!(!user.has_pattern());
        assert!(!user.is_admin);
        assert_eq!(user.display_name_color, "#000000");
        assert!(user.needs_onboarding());
    }

    #[test]
    fn test_onboarding_done_with_genres() {
        let mut user = User::new("bob");
        user.preferences.genres.push("Horror".to_string());
        assert!(!user.needs_onboarding());
    }

    #[test]
    fn test_label_prefers_display_name() {
        let mut user = User::new("bob");
        assert_eq!(user.label(), "bob");
        user.display_name = Some("Bobby".to_string());
        assert_eq!(user.label(), "Bobby");
    }

    #[test]
    fn test_pattern_hash_never_serialized() {
        let mut user = User::new("carol");
        user.pattern_hash = Some("$2b$10$secret".to_string());
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("patternHash").is_none());
        assert_eq!(json["displayNameColor"], "#000000");
    }
}
