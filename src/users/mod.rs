//! Read access to the user directory: lookup, paginated search and signup stats.

pub mod handlers;
mod service;

pub use service::{UserService, UserStats, UserSummary, UsersPage};
