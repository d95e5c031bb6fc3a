//! Engine adapters.
//!
//! The production automation backend lives outside this crate; it only has to
//! satisfy the [`crate::ports::Engine`] contract. The mock here drives the
//! whole core in tests and local development.

mod mock;

pub use mock::{MockEngine, MockEngineFactory};
