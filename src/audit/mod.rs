//! Audit trail for authentication events.
//!
//! Services hand every security-relevant event to an [`AuditSink`]. Sinks
//! are fire-and-forget: recording can never fail or block the caller.
//! Phone numbers are masked when the event is built, so no sink ever sees
//! the full number.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    InvalidPhoneNumber,
    OtpGenerated,
    RateLimited,
    OtpVerification,
    UserRegistered,
    UserLogin,
    MaintenanceCleanup,
}

impl AuditEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventKind::InvalidPhoneNumber => "invalid_phone_number",
            AuditEventKind::OtpGenerated => "otp_generated",
            AuditEventKind::RateLimited => "rate_limit",
            AuditEventKind::OtpVerification => "otp_verification",
            AuditEventKind::UserRegistered => "user_registration",
            AuditEventKind::UserLogin => "user_login",
            AuditEventKind::MaintenanceCleanup => "cleanup",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub kind: AuditEventKind,
    /// Always masked.
    pub phone_number: String,
    pub user_id: Option<Uuid>,
    pub outcome: Outcome,
    pub detail: String,
    /// Plaintext code of an `OtpGenerated` event. Delivery hooks read it; it is never serialized.
    #[serde(skip)]
    pub otp_code: Option<String>,
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(kind: AuditEventKind, phone_number: &str, outcome: Outcome) -> Self {
        Self {
            kind,
            phone_number: mask_phone_number(phone_number),
            user_id: None,
            outcome,
            detail: String::new(),
            otp_code: None,
            at: Utc::now(),
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn with_otp_code(mut self, code: impl Into<String>) -> Self {
        self.otp_code = Some(code.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Writes events to the `audit` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        let user_id = event.user_id.map(|id| id.to_string()).unwrap_or_default();
        let security_event = matches!(
            event.kind,
            AuditEventKind::InvalidPhoneNumber | AuditEventKind::RateLimited
        );

        if security_event || event.outcome == Outcome::Failure {
            warn!(
                target: "audit",
                event_type = event.kind.as_str(),
                phone_number = %event.phone_number,
                user_id = %user_id,
                outcome = ?event.outcome,
                details = %event.detail,
                "Security event"
            );
        } else {
            info!(
                target: "audit",
                event_type = event.kind.as_str(),
                phone_number = %event.phone_number,
                user_id = %user_id,
                outcome = ?event.outcome,
                details = %event.detail,
                "Audit event"
            );
        }

        if let Some(code) = &event.otp_code {
            debug!(target: "audit", phone_number = %event.phone_number, otp_code = %code, "OTP issued");
        }
    }
}

/// Keeps events in memory, e.g. for tests or an embedding process that forwards them itself.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn events_of(&self, kind: AuditEventKind) -> Vec<AuditEvent> {
        self.events().into_iter().filter(|e| e.kind == kind).collect()
    }

    /// Most recent code issued for `phone_number`.
    pub fn latest_otp_code_for(&self, phone_number: &str) -> Option<String> {
        let masked = mask_phone_number(phone_number);
        self.events_of(AuditEventKind::OtpGenerated)
            .into_iter()
            .rev()
            .find(|e| e.phone_number == masked)
            .and_then(|e| e.otp_code)
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

/// Keeps the first two and last two characters; shorter inputs are fully masked.
pub fn mask_phone_number(phone_number: &str) -> String {
    let chars: Vec<char> = phone_number.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }

    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 4), tail)
}
