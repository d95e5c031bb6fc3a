//! Domain layer: value objects, session state machine, check semantics.

pub mod check;
pub mod foundation;
pub mod session;
pub mod user;
