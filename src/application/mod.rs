//! Application core: session table, verification pipeline, subscriber fan-out.

mod pipeline;
mod session_manager;
mod subscribers;

pub use pipeline::{CheckPipeline, PACING_INTERVAL};
pub use session_manager::SessionManager;
pub use subscribers::{ObserverId, SubscriberRegistry};
