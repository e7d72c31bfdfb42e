use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{OtpAttempt, OtpRecord, User};
use crate::db::store::{AttemptStore, OtpStore, UserStore};
use crate::error::{AppError, DatabaseError};
use crate::Result;

/// Process-local store with the same semantics as [`PgStore`](super::PgStore).
///
/// Every mutation runs under a single write lock, which gives the same
/// per-operation atomicity the database provides.
#[derive(Debug, Default)]
pub struct MemoryStore {
    otps: RwLock<Vec<OtpRecord>>,
    attempts: RwLock<Vec<OtpAttempt>>,
    users: RwLock<Vec<User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn otp_count(&self) -> usize {
        self.otps.read().await.len()
    }

    pub async fn attempt_count(&self) -> usize {
        self.attempts.read().await.len()
    }
}

#[async_trait]
impl OtpStore for MemoryStore {
    async fn create_otp(&self, otp: &OtpRecord) -> Result<OtpRecord> {
        self.otps.write().await.push(otp.clone());
        Ok(otp.clone())
    }

    async fn find_valid_otp(&self, phone_number: &str, code: &str) -> Result<Option<OtpRecord>> {
        let otps = self.otps.read().await;
        let found = otps
            .iter()
            .filter(|o| !o.is_used && o.phone_number == phone_number && o.code == code)
            .min_by_key(|o| o.created_at)
            .cloned();
        Ok(found)
    }

    async fn mark_otp_used(&self, id: Uuid) -> Result<u64> {
        let mut otps = self.otps.write().await;
        match otps.iter_mut().find(|o| o.id == id && !o.is_used) {
            Some(otp) => {
                otp.is_used = true;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_expired_otps(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut otps = self.otps.write().await;
        let before = otps.len();
        otps.retain(|o| o.expires_at >= now);
        Ok((before - otps.len()) as u64)
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn create_attempt(&self, attempt: &OtpAttempt) -> Result<()> {
        self.attempts.write().await.push(attempt.clone());
        Ok(())
    }

    async fn count_attempts_since(&self, phone_number: &str, since: DateTime<Utc>) -> Result<u64> {
        let attempts = self.attempts.read().await;
        let count = attempts
            .iter()
            .filter(|a| a.phone_number == phone_number && a.attempt_time > since)
            .count();
        Ok(count as u64)
    }

    async fn delete_attempts_before(&self, before: DateTime<Utc>) -> Result<u64> {
        let mut attempts = self.attempts.write().await;
        let len = attempts.len();
        attempts.retain(|a| a.attempt_time >= before);
        Ok((len - attempts.len()) as u64)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: &User) -> Result<User> {
        let mut users = self.users.write().await;
        if users
            .iter()
            .any(|u| u.id == user.id || u.phone_number == user.phone_number)
        {
            return Err(AppError::DatabaseError(DatabaseError::Duplicate));
        }
        users.push(user.clone());
        Ok(user.clone())
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_phone(&self, phone_number: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.phone_number == phone_number)
            .cloned())
    }

    async fn list_users(&self, page: u32, limit: u32, search: Option<String>) -> Result<(Vec<User>, u64)> {
        let needle = search.map(|s| s.to_lowercase());
        let mut matching: Vec<User> = self
            .users
            .read()
            .await
            .iter()
            .filter(|u| match &needle {
                Some(n) => u.phone_number.to_lowercase().contains(n.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let offset = (page.max(1) as usize - 1) * limit as usize;
        let page_rows = matching.into_iter().skip(offset).take(limit as usize).collect();
        Ok((page_rows, total))
    }

    async fn update_user(&self, user: &User) -> Result<User> {
        let mut users = self.users.write().await;
        if users
            .iter()
            .any(|u| u.id != user.id && u.phone_number == user.phone_number)
        {
            return Err(AppError::DatabaseError(DatabaseError::Duplicate));
        }
        let existing = users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or(AppError::DatabaseError(DatabaseError::NotFound))?;
        existing.phone_number = user.phone_number.clone();
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn delete_user(&self, id: Uuid) -> Result<()> {
        let mut users = self.users.write().await;
        let len = users.len();
        users.retain(|u| u.id != id);
        if users.len() == len {
            return Err(AppError::DatabaseError(DatabaseError::NotFound));
        }
        Ok(())
    }

    async fn all_users(&self) -> Result<Vec<User>> {
        let mut users = self.users.read().await.clone();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }
}
