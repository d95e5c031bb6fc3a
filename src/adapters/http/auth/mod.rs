//! HTTP adapter for account registration and login.

mod dto;
mod handlers;
mod routes;

pub use dto::{AuthResponse, LoginRequest, RegisterRequest, UserResponse};
pub use handlers::{login, logout, me, register, AuthHandlers};
pub use routes::auth_routes;
