//! HTTP surface for the Tandem agent.
//!
//! Exposes chat and resume as SSE streams, session lifecycle endpoints for
//! the HRMS backend, and checkpoint deletion for "clear memory".

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use router::build_router;
pub use state::AppState;
