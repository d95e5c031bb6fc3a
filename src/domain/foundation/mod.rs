//! Foundation value objects shared by every other domain module.

mod auth;
mod errors;
mod ids;
mod timestamp;

pub use auth::{AuthError, AuthenticatedUser};
pub use errors::{DomainError, ErrorCode};
pub use ids::{CheckId, UserId};
pub use timestamp::Timestamp;
