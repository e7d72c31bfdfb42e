//! Storage capabilities used by the OTP engine and the user directory.
//!
//! Each trait covers one table. [`PgStore`](super::PgStore) and
//! [`MemoryStore`](super::MemoryStore) implement all three.
//! Lookups that find nothing return `Ok(None)`; callers decide which
//! domain error that becomes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::{OtpAttempt, OtpRecord, User};
use crate::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn create_otp(&self, otp: &OtpRecord) -> Result<OtpRecord>;

    /// First unused record matching phone and code, oldest first. Expiry is not checked here.
    async fn find_valid_otp(&self, phone_number: &str, code: &str) -> Result<Option<OtpRecord>>;

    /// Flips `is_used` only if it is still false. Returns the number of rows changed.
    async fn mark_otp_used(&self, id: Uuid) -> Result<u64>;

    async fn delete_expired_otps(&self, now: DateTime<Utc>) -> Result<u64>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn create_attempt(&self, attempt: &OtpAttempt) -> Result<()>;

    /// Attempts strictly after `since`.
    async fn count_attempts_since(&self, phone_number: &str, since: DateTime<Utc>) -> Result<u64>;

    async fn delete_attempts_before(&self, before: DateTime<Utc>) -> Result<u64>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `DatabaseError::Duplicate` when the phone number is taken.
    async fn create_user(&self, user: &User) -> Result<User>;

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn get_user_by_phone(&self, phone_number: &str) -> Result<Option<User>>;

    /// One page ordered by `created_at` descending, plus the total match count.
    async fn list_users(&self, page: u32, limit: u32, search: Option<String>) -> Result<(Vec<User>, u64)>;

    async fn update_user(&self, user: &User) -> Result<User>;

    async fn delete_user(&self, id: Uuid) -> Result<()>;

    async fn all_users(&self) -> Result<Vec<User>>;
}

/// Everything the services need from one backing store.
pub trait CredentialStore: OtpStore + AttemptStore + UserStore {}

impl<T: OtpStore + AttemptStore + UserStore + ?Sized> CredentialStore for T {}
