//! Authentication adapters: JWT bearer tokens and password digests.

mod jwt;
mod password;

pub use jwt::JwtTokenService;
pub use password::{hash_password, verify_password};
