//! Input validation for phone numbers, OTP codes, pagination and search queries.
//!
//! All validators are pure. Field-level problems are collected into
//! [`ValidationErrors`] so a caller can report every issue at once.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::error::AppError;

pub const PHONE_MIN_LEN: usize = 10;
pub const PHONE_MAX_LEN: usize = 15;
pub const OTP_CODE_LEN: usize = 6;
pub const MAX_PAGE_LIMIT: i64 = 100;
pub const MAX_PAGE: i64 = u32::MAX as i64;
pub const SEARCH_MIN_LEN: usize = 2;
pub const SEARCH_MAX_LEN: usize = 50;

/// Substrings rejected in search queries (case-insensitive).
///
/// Queries are always bound as parameters; this list only keeps obvious
/// markup and SQL fragments out of the logs and the database.
const SEARCH_DENY_LIST: &[&str] = &[
    "<script",
    "javascript:",
    "onload=",
    "onerror=",
    "drop table",
    "delete from",
    "insert into",
    "update set",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, field: &'static str, message: &'static str) {
        self.0.push(FieldError { field, message });
    }

    pub fn has_errors(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn into_result(self) -> Result<(), AppError> {
        if self.has_errors() {
            Err(AppError::ValidationError(self.to_string()))
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", messages.join(", "))
    }
}

fn phone_regex() -> &'static Regex {
    static PHONE_REGEX: OnceLock<Regex> = OnceLock::new();
    PHONE_REGEX.get_or_init(|| {
        Regex::new(r"^\+?[1-9][0-9]{1,14}$").expect("Failed to compile phone number regex")
    })
}

/// E.164-like: optional `+`, no leading zero, 10 to 15 characters in total.
pub fn validate_phone_number(phone_number: &str) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    if phone_number.is_empty() {
        errors.push("phone_number", "phone number is required");
        return errors;
    }

    if phone_number.len() < PHONE_MIN_LEN {
        errors.push("phone_number", "phone number must be at least 10 digits");
    }

    if phone_number.len() > PHONE_MAX_LEN {
        errors.push("phone_number", "phone number must not exceed 15 digits");
    }

    if !phone_regex().is_match(phone_number) {
        errors.push("phone_number", "invalid phone number format");
    }

    errors
}

pub fn validate_otp_code(code: &str) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    if code.is_empty() {
        errors.push("code", "OTP code is required");
        return errors;
    }

    if code.len() != OTP_CODE_LEN {
        errors.push("code", "OTP code must be exactly 6 digits");
    }

    if !code.bytes().all(|b| b.is_ascii_digit()) {
        errors.push("code", "OTP code must contain only digits");
    }

    errors
}

pub fn validate_pagination(page: i64, limit: i64) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    if page < 1 {
        errors.push("page", "page must be greater than 0");
    }

    if page > MAX_PAGE {
        errors.push("page", "page is too large");
    }

    if limit < 1 {
        errors.push("limit", "limit must be greater than 0");
    }

    if limit > MAX_PAGE_LIMIT {
        errors.push("limit", "limit cannot exceed 100");
    }

    errors
}

pub fn is_valid_search_query(query: &str) -> bool {
    if query.len() < SEARCH_MIN_LEN || query.len() > SEARCH_MAX_LEN {
        return false;
    }

    let lowered = query.to_lowercase();
    !SEARCH_DENY_LIST.iter().any(|pattern| lowered.contains(pattern))
}

pub fn parse_user_id(user_id: &str) -> Result<Uuid, AppError> {
    if user_id.is_empty() {
        return Err(AppError::ValidationError("user_id: user ID is required".into()));
    }
    Uuid::parse_str(user_id)
        .map_err(|_| AppError::ValidationError("user_id: invalid user ID format".into()))
}
