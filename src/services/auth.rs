use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Session tokens stay valid for a week
const TOKEN_LIFETIME_DAYS: i64 = 7;

/// Smallest number of dots in an unlock pattern
const MIN_PATTERN_DOTS: usize = 4;

/// Signing and hashing parameters shared by the auth routes
#[derive(Clone)]
pub struct AuthSettings {
    jwt_secret: String,
    bcrypt_cost: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    pub exp: usize,
}

/// Whether `pattern` is a valid dot sequence such as `1-5-9-3`
///
/// At least four dots, every dot in 1..=9, no dot visited twice.
pub fn validate_pattern(pattern: &str) -> bool {
    let mut seen = HashSet::new();
    let mut count = 0;
    for part in pattern.split('-') {
        match part.trim().parse::<u8>() {
            Ok(dot @ 1..=9) if seen.insert(dot) => count += 1,
            _ => return false,
        }
    }
    count >= MIN_PATTERN_DOTS
}

impl AuthSettings {
    pub fn new(jwt_secret: impl Into<String>, bcrypt_cost: u32) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            bcrypt_cost,
        }
    }

    /// Hashes on the blocking pool; bcrypt is CPU bound
    pub async fn hash_pattern(&self, pattern: &str) -> AppResult<String> {
        let pattern = pattern.to_string();
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(pattern, cost))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
            .map_err(|e| AppError::Internal(format!("Failed to hash pattern: {}", e)))
    }

    pub async fn verify_pattern(&self, pattern: &str, hash: &str) -> AppResult<bool> {
        let pattern = pattern.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || bcrypt::verify(pattern, &hash))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
            .map_err(|e| AppError::Internal(format!("Failed to verify pattern: {}", e)))
    }

    pub fn issue_token(&self, user_id: Uuid) -> AppResult<String> {
        let exp = (Utc::now() + Duration::days(TOKEN_LIFETIME_DAYS)).timestamp() as usize;
        let claims = Claims { user_id, exp };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Any decoding failure, including expiry, is reported as "Invalid token"
    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "Rejected session token");
            AppError::Unauthorized("Invalid token".to_string())
        })
    }
}
