//! Coordinador MapReduce: estado del job, API HTTP y loop de vida.

pub mod handlers;
pub mod monitor;
pub mod state;

pub use handlers::build_router;
pub use state::{AppState, JobState};
