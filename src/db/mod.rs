//! Database module for the phone auth server
//!
//! Persistence models, the storage capability traits and their
//! PostgreSQL and in-memory implementations.

pub mod memory;
pub mod models;
pub mod operations;
pub mod store;

pub use memory::MemoryStore;
pub use models::{OtpAttempt, OtpRecord, User};
pub use operations::PgStore;
pub use store::{AttemptStore, CredentialStore, OtpStore, UserStore};
