//! PostgreSQL adapter implementations.

mod check_history_repository;
mod session_status_repository;
mod user_repository;

pub use check_history_repository::PostgresCheckHistoryRepository;
pub use session_status_repository::PostgresSessionStatusRepository;
pub use user_repository::PostgresUserRepository;
