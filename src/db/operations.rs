use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use sqlx::{Postgres, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};
use uuid::Uuid;

use crate::db::models::{OtpAttempt, OtpRecord, User};
use crate::db::store::{AttemptStore, OtpStore, UserStore};
use crate::error::{AppError, DatabaseError};
use crate::Result;

const USER_COLUMNS: &str = "id, phone_number, created_at, updated_at";
const OTP_COLUMNS: &str = "id, phone_number, code, created_at, expires_at, is_used";

/// PostgreSQL-backed credential store.
pub struct PgStore {
    pool: Arc<PgPool>,
}

fn db_failure(operation: &'static str, table: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |err| {
        let err = AppError::from(err);
        if !matches!(err, AppError::DatabaseError(DatabaseError::Duplicate)) {
            error!(operation, table, error = %err, "Database operation failed");
        }
        err.context(operation)
    }
}

/// Escapes LIKE wildcards so the search term matches literally.
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

impl PgStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| AppError::DatabaseError(DatabaseError::ConnectionError(e.to_string())))?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn begin_transaction(&self) -> Result<Transaction<'_, Postgres>> {
        Ok(self.pool.as_ref().begin().await?)
    }

    pub async fn create_user_with_transaction(
        &self,
        user: &User,
        transaction: &mut Transaction<'_, Postgres>,
    ) -> Result<User> {
        let query = format!(
            "INSERT INTO users (id, phone_number, created_at, updated_at) VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(user.id)
            .bind(&user.phone_number)
            .bind(user.created_at)
            .bind(user.updated_at)
            .fetch_one(&mut **transaction)
            .await
            .map_err(db_failure("create", "users"))?;

        Ok(user)
    }
}

#[async_trait]
impl OtpStore for PgStore {
    async fn create_otp(&self, otp: &OtpRecord) -> Result<OtpRecord> {
        let query = format!(
            "INSERT INTO otps (id, phone_number, code, created_at, expires_at, is_used) VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            OTP_COLUMNS
        );
        let otp = sqlx::query_as::<_, OtpRecord>(&query)
            .bind(otp.id)
            .bind(&otp.phone_number)
            .bind(&otp.code)
            .bind(otp.created_at)
            .bind(otp.expires_at)
            .bind(otp.is_used)
            .fetch_one(self.pool.as_ref())
            .await
            .map_err(db_failure("create", "otps"))?;

        debug!(table = "otps", "OTP record created");
        Ok(otp)
    }

    async fn find_valid_otp(&self, phone_number: &str, code: &str) -> Result<Option<OtpRecord>> {
        let query = format!(
            "SELECT {} FROM otps WHERE phone_number = $1 AND code = $2 AND is_used = false ORDER BY created_at ASC LIMIT 1",
            OTP_COLUMNS
        );
        let otp = sqlx::query_as::<_, OtpRecord>(&query)
            .bind(phone_number)
            .bind(code)
            .fetch_optional(self.pool.as_ref())
            .await
            .map_err(db_failure("find", "otps"))?;

        Ok(otp)
    }

    async fn mark_otp_used(&self, id: Uuid) -> Result<u64> {
        let result = sqlx::query("UPDATE otps SET is_used = true WHERE id = $1 AND is_used = false")
            .bind(id)
            .execute(self.pool.as_ref())
            .await
            .map_err(db_failure("update", "otps"))?;

        Ok(result.rows_affected())
    }

    async fn delete_expired_otps(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut transaction = self.begin_transaction().await?;

        let result = sqlx::query("DELETE FROM otps WHERE expires_at < $1")
            .bind(now)
            .execute(&mut *transaction)
            .await;

        match result {
            Ok(result) => {
                transaction.commit().await?;
                Ok(result.rows_affected())
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(db_failure("cleanup", "otps")(e))
            }
        }
    }
}

#[async_trait]
impl AttemptStore for PgStore {
    async fn create_attempt(&self, attempt: &OtpAttempt) -> Result<()> {
        sqlx::query("INSERT INTO otp_attempts (id, phone_number, attempt_time) VALUES ($1, $2, $3)")
            .bind(attempt.id)
            .bind(&attempt.phone_number)
            .bind(attempt.attempt_time)
            .execute(self.pool.as_ref())
            .await
            .map_err(db_failure("create", "otp_attempts"))?;

        Ok(())
    }

    async fn count_attempts_since(&self, phone_number: &str, since: DateTime<Utc>) -> Result<u64> {
        let count: i64 = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM otp_attempts WHERE phone_number = $1 AND attempt_time > $2",
        )
        .bind(phone_number)
        .bind(since)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(db_failure("count", "otp_attempts"))?;

        Ok(count.max(0) as u64)
    }

    async fn delete_attempts_before(&self, before: DateTime<Utc>) -> Result<u64> {
        let mut transaction = self.begin_transaction().await?;

        let result = sqlx::query("DELETE FROM otp_attempts WHERE attempt_time < $1")
            .bind(before)
            .execute(&mut *transaction)
            .await;

        match result {
            Ok(result) => {
                transaction.commit().await?;
                Ok(result.rows_affected())
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(db_failure("cleanup", "otp_attempts")(e))
            }
        }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: &User) -> Result<User> {
        let mut transaction = self.begin_transaction().await?;

        let result = self.create_user_with_transaction(user, &mut transaction).await;

        match result {
            Ok(user) => {
                transaction.commit().await?;
                Ok(user)
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e)
            }
        }
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await
            .map_err(db_failure("find", "users"))?;

        Ok(user)
    }

    async fn get_user_by_phone(&self, phone_number: &str) -> Result<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE phone_number = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(phone_number)
            .fetch_optional(self.pool.as_ref())
            .await
            .map_err(db_failure("find", "users"))?;

        Ok(user)
    }

    async fn list_users(&self, page: u32, limit: u32, search: Option<String>) -> Result<(Vec<User>, u64)> {
        let pattern = search.as_deref().map(like_pattern);

        let total: i64 = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE ($1::text IS NULL OR phone_number ILIKE $1)",
        )
        .bind(pattern.as_deref())
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(db_failure("count", "users"))?;

        let offset = (i64::from(page.max(1)) - 1) * i64::from(limit);
        let query = format!(
            "SELECT {} FROM users WHERE ($1::text IS NULL OR phone_number ILIKE $1) ORDER BY created_at DESC OFFSET $2 LIMIT $3",
            USER_COLUMNS
        );
        let users = sqlx::query_as::<_, User>(&query)
            .bind(pattern.as_deref())
            .bind(offset)
            .bind(i64::from(limit))
            .fetch_all(self.pool.as_ref())
            .await
            .map_err(db_failure("find", "users"))?;

        Ok((users, total.max(0) as u64))
    }

    async fn update_user(&self, user: &User) -> Result<User> {
        let query = format!(
            "UPDATE users SET phone_number = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&query)
            .bind(user.id)
            .bind(&user.phone_number)
            .bind(Utc::now())
            .fetch_optional(self.pool.as_ref())
            .await
            .map_err(db_failure("update", "users"))?
            .ok_or(AppError::DatabaseError(DatabaseError::NotFound))
    }

    async fn delete_user(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await
            .map_err(db_failure("delete", "users"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::DatabaseError(DatabaseError::NotFound));
        }
        Ok(())
    }

    async fn all_users(&self) -> Result<Vec<User>> {
        let query = format!("SELECT {} FROM users ORDER BY created_at DESC", USER_COLUMNS);
        let users = sqlx::query_as::<_, User>(&query)
            .fetch_all(self.pool.as_ref())
            .await
            .map_err(db_failure("find", "users"))?;

        Ok(users)
    }
}
