use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::audit::{mask_phone_number, AuditEvent, AuditEventKind, AuditSink, Outcome};
use crate::auth::otp::generate_otp;
use crate::auth::rate_limit::{RateLimitConfig, RateLimitDecision, RateLimiter};
use crate::config::OtpConfig;
use crate::db::models::{OtpRecord, User};
use crate::db::store::{AttemptStore, CredentialStore, OtpStore, UserStore};
use crate::error::{AppError, AuthError, DatabaseError};
use crate::validation::{validate_otp_code, validate_phone_number};
use crate::Result;

#[derive(Debug, Clone)]
pub struct OtpPolicy {
    pub expiry: Duration,
    pub rate_limit: RateLimitConfig,
    pub attempt_retention: Duration,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            expiry: Duration::minutes(2),
            rate_limit: RateLimitConfig::default(),
            attempt_retention: Duration::hours(24),
        }
    }
}

impl From<&OtpConfig> for OtpPolicy {
    fn from(config: &OtpConfig) -> Self {
        Self {
            expiry: config.expiry(),
            rate_limit: RateLimitConfig::from(config),
            attempt_retention: config.attempt_retention(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub expired_otps_removed: u64,
    pub attempts_removed: u64,
    pub failures: usize,
}

/// Issues and verifies one-time codes and resolves the verified phone number to a user.
///
/// Holds no per-request state; everything lives in the store. The `_at`
/// variants take the current time explicitly.
pub struct OtpService {
    otps: Arc<dyn OtpStore>,
    users: Arc<dyn UserStore>,
    rate_limiter: RateLimiter,
    audit: Arc<dyn AuditSink>,
    policy: OtpPolicy,
}

impl OtpService {
    pub fn new(
        otps: Arc<dyn OtpStore>,
        attempts: Arc<dyn AttemptStore>,
        users: Arc<dyn UserStore>,
        audit: Arc<dyn AuditSink>,
        policy: OtpPolicy,
    ) -> Self {
        let rate_limiter = RateLimiter::new(attempts, policy.rate_limit.clone());
        Self {
            otps,
            users,
            rate_limiter,
            audit,
            policy,
        }
    }

    pub fn from_store<S>(store: Arc<S>, audit: Arc<dyn AuditSink>, policy: OtpPolicy) -> Self
    where
        S: CredentialStore + 'static,
    {
        Self::new(store.clone(), store.clone(), store, audit, policy)
    }

    pub fn policy(&self) -> &OtpPolicy {
        &self.policy
    }

    pub async fn send_otp(&self, phone_number: &str) -> Result<()> {
        self.send_otp_at(phone_number, Utc::now()).await
    }

    pub async fn send_otp_at(&self, phone_number: &str, now: DateTime<Utc>) -> Result<()> {
        let errors = validate_phone_number(phone_number);
        if errors.has_errors() {
            self.audit.record(
                AuditEvent::new(AuditEventKind::InvalidPhoneNumber, phone_number, Outcome::Failure)
                    .with_detail(errors.to_string()),
            );
            return errors.into_result();
        }

        let decision = self
            .rate_limiter
            .check_rate_limit(phone_number, now)
            .await
            .map_err(|e| e.context("checking OTP rate limit"))?;
        if let RateLimitDecision::Blocked { attempts } = decision {
            let max_attempts = self.rate_limiter.config().max_attempts;
            self.audit.record(
                AuditEvent::new(AuditEventKind::RateLimited, phone_number, Outcome::Failure)
                    .with_detail(format!("attempts={} max_attempts={}", attempts, max_attempts)),
            );
            return Err(AuthError::RateLimited.into());
        }

        let code = generate_otp().map_err(|e| e.context("generating OTP"))?;
        let otp = OtpRecord::new(phone_number, code, now, self.policy.expiry);
        let otp = self
            .otps
            .create_otp(&otp)
            .await
            .map_err(|e| e.context("storing OTP"))?;

        // The code is already persisted, so a lost attempt row only loosens the limit slightly.
        if let Err(e) = self.rate_limiter.record_attempt(phone_number, now).await {
            warn!(
                phone_number = %mask_phone_number(phone_number),
                error = %e,
                "Failed to record OTP attempt"
            );
        }

        self.audit.record(
            AuditEvent::new(AuditEventKind::OtpGenerated, phone_number, Outcome::Success)
                .with_detail(format!("expires_at={}", otp.expires_at.to_rfc3339()))
                .with_otp_code(otp.code.clone()),
        );
        Ok(())
    }

    pub async fn verify_otp(&self, phone_number: &str, code: &str) -> Result<User> {
        self.verify_otp_at(phone_number, code, Utc::now()).await
    }

    pub async fn verify_otp_at(&self, phone_number: &str, code: &str, now: DateTime<Utc>) -> Result<User> {
        let mut errors = validate_phone_number(phone_number);
        for field in validate_otp_code(code).errors() {
            errors.push(field.field, field.message);
        }
        if errors.has_errors() {
            self.record_verification(phone_number, Outcome::Failure, &errors.to_string());
            errors.into_result()?;
            unreachable!("has_errors() guarantees into_result() is Err");
        }

        let otp = match self
            .otps
            .find_valid_otp(phone_number, code)
            .await
            .map_err(|e| e.context("looking up OTP"))?
        {
            Some(otp) => otp,
            None => {
                self.record_verification(phone_number, Outcome::Failure, "no matching unused code");
                return Err(AuthError::InvalidOtp.into());
            }
        };

        if otp.is_expired_at(now) {
            self.record_verification(phone_number, Outcome::Failure, "code expired");
            return Err(AuthError::OtpExpired.into());
        }

        let changed = self
            .otps
            .mark_otp_used(otp.id)
            .await
            .map_err(|e| e.context("marking OTP used"))?;
        if changed == 0 {
            // A concurrent verification consumed it first.
            self.record_verification(phone_number, Outcome::Failure, "code already used");
            return Err(AuthError::InvalidOtp.into());
        }

        self.record_verification(phone_number, Outcome::Success, "OTP verified successfully");
        self.resolve_user(phone_number).await
    }

    /// Returns the user owning `phone_number`, creating it on first verification.
    async fn resolve_user(&self, phone_number: &str) -> Result<User> {
        if let Some(user) = self.users.get_user_by_phone(phone_number).await? {
            self.record_login(&user);
            return Ok(user);
        }

        match self.users.create_user(&User::new(phone_number)).await {
            Ok(user) => {
                self.audit.record(
                    AuditEvent::new(AuditEventKind::UserRegistered, phone_number, Outcome::Success)
                        .with_user(user.id),
                );
                info!(user_id = %user.id, phone_number = %mask_phone_number(phone_number), "New user registered");
                Ok(user)
            }
            Err(AppError::DatabaseError(DatabaseError::Duplicate)) => {
                // Lost a creation race; the winner's row is the login target.
                let user = self
                    .users
                    .get_user_by_phone(phone_number)
                    .await?
                    .ok_or_else(|| {
                        AppError::InternalError("user vanished after duplicate insert".into())
                    })?;
                self.record_login(&user);
                Ok(user)
            }
            Err(e) => Err(e.context("creating user")),
        }
    }

    fn record_verification(&self, phone_number: &str, outcome: Outcome, reason: &str) {
        self.audit.record(
            AuditEvent::new(AuditEventKind::OtpVerification, phone_number, outcome).with_detail(reason),
        );
    }

    fn record_login(&self, user: &User) {
        self.audit.record(
            AuditEvent::new(AuditEventKind::UserLogin, &user.phone_number, Outcome::Success)
                .with_user(user.id),
        );
    }

    pub async fn cleanup_expired_otps(&self) -> Result<u64> {
        let removed = self
            .otps
            .delete_expired_otps(Utc::now())
            .await
            .map_err(|e| e.context("cleaning up expired OTPs"))?;
        if removed > 0 {
            info!(rows_affected = removed, table = "otps", "Cleaned up expired OTPs");
        }
        Ok(removed)
    }

    pub async fn cleanup_old_attempts(&self, before: DateTime<Utc>) -> Result<u64> {
        let removed = self
            .rate_limiter
            .cleanup(before)
            .await
            .map_err(|e| e.context("cleaning up OTP attempts"))?;
        if removed > 0 {
            info!(rows_affected = removed, table = "otp_attempts", "Cleaned up old OTP attempts");
        }
        Ok(removed)
    }

    /// Runs both cleanups. Failures are logged and counted, never returned.
    pub async fn run_maintenance(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        match self.cleanup_expired_otps().await {
            Ok(removed) => report.expired_otps_removed = removed,
            Err(e) => {
                warn!(error = %e, "Expired OTP cleanup failed");
                report.failures += 1;
            }
        }

        let cutoff = Utc::now() - self.policy.attempt_retention;
        match self.cleanup_old_attempts(cutoff).await {
            Ok(removed) => report.attempts_removed = removed,
            Err(e) => {
                warn!(error = %e, "OTP attempt cleanup failed");
                report.failures += 1;
            }
        }

        let outcome = if report.failures == 0 {
            Outcome::Success
        } else {
            Outcome::Failure
        };
        self.audit.record(
            AuditEvent::new(AuditEventKind::MaintenanceCleanup, "", outcome).with_detail(format!(
                "expired_otps={} attempts={}",
                report.expired_otps_removed, report.attempts_removed
            )),
        );

        report
    }
}
