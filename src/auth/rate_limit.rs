use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};

use crate::config::OtpConfig;
use crate::db::models::OtpAttempt;
use crate::db::store::AttemptStore;
use crate::Result;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window_size: Duration,
    pub max_attempts: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_size: Duration::minutes(10),
            max_attempts: 3,
        }
    }
}

impl From<&OtpConfig> for RateLimitConfig {
    fn from(config: &OtpConfig) -> Self {
        Self {
            window_size: config.rate_window(),
            max_attempts: config.max_attempts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { attempts: u64 },
    Blocked { attempts: u64 },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

/// Sliding-window limit on OTP sends per phone number.
///
/// The window is recomputed from the attempt log on every check, so the
/// limiter itself holds no state and any number of instances may share a store.
pub struct RateLimiter {
    attempts: Arc<dyn AttemptStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(attempts: Arc<dyn AttemptStore>, config: RateLimitConfig) -> Self {
        Self { attempts, config }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub async fn check_rate_limit(&self, phone_number: &str, now: DateTime<Utc>) -> Result<RateLimitDecision> {
        let cutoff = now - self.config.window_size;
        let attempts = self.attempts.count_attempts_since(phone_number, cutoff).await?;

        if attempts >= u64::from(self.config.max_attempts) {
            Ok(RateLimitDecision::Blocked { attempts })
        } else {
            Ok(RateLimitDecision::Allowed { attempts })
        }
    }

    pub async fn record_attempt(&self, phone_number: &str, now: DateTime<Utc>) -> Result<()> {
        self.attempts
            .create_attempt(&OtpAttempt::new(phone_number, now))
            .await
    }

    /// Drops attempts older than `before`. Returns how many were removed.
    pub async fn cleanup(&self, before: DateTime<Utc>) -> Result<u64> {
        self.attempts.delete_attempts_before(before).await
    }
}
