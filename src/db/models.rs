use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(phone_number: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            phone_number: phone_number.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A one-time code issued for a phone number.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct OtpRecord {
    pub id: Uuid,
    pub phone_number: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
}

impl OtpRecord {
    pub fn new(phone_number: impl Into<String>, code: impl Into<String>, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            phone_number: phone_number.into(),
            code: code.into(),
            created_at: issued_at,
            expires_at: issued_at + ttl,
            is_used: false,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Usable for verification: not consumed and `now <= expires_at`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_used && !self.is_expired_at(now)
    }
}

/// One row per send request, used only for rate-limit accounting.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct OtpAttempt {
    pub id: Uuid,
    pub phone_number: String,
    pub attempt_time: DateTime<Utc>,
}

impl OtpAttempt {
    pub fn new(phone_number: impl Into<String>, attempt_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            phone_number: phone_number.into(),
            attempt_time,
        }
    }
}
