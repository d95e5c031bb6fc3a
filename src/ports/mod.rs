//! Ports: trait boundaries between the core and its external collaborators.

mod check_history;
mod engine;
mod session_status;
mod token_service;
mod user_repository;

pub use check_history::CheckHistoryRepository;
pub use engine::{Engine, EngineError, EngineEvent, EngineFactory};
pub use session_status::{SessionStatusRepository, SessionStatusRow};
pub use token_service::TokenService;
pub use user_repository::UserRepository;
