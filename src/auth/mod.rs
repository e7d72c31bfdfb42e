//! Authentication module for the phone auth server
//!
//! OTP issuance and verification, the send rate limit, bearer tokens
//! and the authenticated-principal extractor.

pub mod handlers;
mod extractor;
mod otp;
mod rate_limit;
mod service;
mod token;

pub use extractor::AuthenticatedUser;
pub use otp::{generate_otp, generate_otp_with, OTP_LENGTH};
pub use rate_limit::{RateLimitConfig, RateLimitDecision, RateLimiter};
pub use service::{MaintenanceReport, OtpPolicy, OtpService};
pub use token::{Claims, TokenIssuer};
