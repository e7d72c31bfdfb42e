use chrono::{DateTime, Duration, Local, Months, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::models::User;
use crate::db::store::UserStore;
use crate::error::{AppError, DatabaseError};
use crate::validation::{is_valid_search_query, validate_pagination};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub phone_number: String,
    pub created_at: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            phone_number: user.phone_number.clone(),
            created_at: user.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsersPage {
    pub users: Vec<UserSummary>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_users: u64,
    pub users_today: u64,
    pub users_this_week: u64,
    pub users_this_month: u64,
    pub timestamp: String,
}

/// Read-mostly access to registered users.
pub struct UserService {
    users: Arc<dyn UserStore>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> Result<User> {
        self.users
            .get_user_by_id(id)
            .await?
            .ok_or(AppError::UserNotFound)
    }

    pub async fn list_users(&self, page: i64, limit: i64, search: Option<&str>) -> Result<UsersPage> {
        validate_pagination(page, limit).into_result()?;

        let search = search.filter(|s| !s.is_empty());
        if let Some(query) = search {
            if !is_valid_search_query(query) {
                return Err(AppError::ValidationError("invalid search query".into()));
            }
        }

        let page = u32::try_from(page)
            .map_err(|_| AppError::ValidationError("page: page is too large".into()))?;
        let limit = u32::try_from(limit)
            .map_err(|_| AppError::ValidationError("limit: limit cannot exceed 100".into()))?;
        let (users, total) = self
            .users
            .list_users(page, limit, search.map(str::to_string))
            .await?;

        Ok(UsersPage {
            users: users.iter().map(UserSummary::from).collect(),
            total,
            page,
            limit,
            total_pages: total.div_ceil(u64::from(limit)),
        })
    }

    /// Counts users by signup age. Scans every user, which is fine at the expected scale.
    pub async fn get_user_stats(&self) -> Result<UserStats> {
        self.get_user_stats_at(Local::now()).await
    }

    pub async fn get_user_stats_at(&self, now: DateTime<Local>) -> Result<UserStats> {
        let users = self.users.all_users().await?;

        let today = local_midnight(now)?;
        let this_week = today - Duration::days(7);
        let this_month = today
            .checked_sub_months(Months::new(1))
            .ok_or_else(|| AppError::InternalError("month boundary out of range".into()))?;

        let count_after = |boundary: DateTime<Utc>| {
            users.iter().filter(|u| u.created_at > boundary).count() as u64
        };

        Ok(UserStats {
            total_users: users.len() as u64,
            users_today: count_after(today),
            users_this_week: count_after(this_week),
            users_this_month: count_after(this_month),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Secs, true),
        })
    }

    /// Administrative removal. The OTP flow never deletes users.
    pub async fn delete_user(&self, id: Uuid) -> Result<()> {
        match self.users.delete_user(id).await {
            Err(AppError::DatabaseError(DatabaseError::NotFound)) => Err(AppError::UserNotFound),
            other => other,
        }
    }
}

fn local_midnight(now: DateTime<Local>) -> Result<DateTime<Utc>> {
    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| AppError::InternalError("invalid midnight".into()))?;

    // A DST jump can skip local midnight; fall back to the UTC reading of it
    let midnight = match Local.from_local_datetime(&midnight).earliest() {
        Some(local) => local.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&midnight),
    };
    Ok(midnight)
}
