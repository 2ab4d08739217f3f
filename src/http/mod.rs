//! Axum-based HTTP server for the planning API.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use error::{ApiError, AppError};
pub use router::build_router;
pub use state::AppState;
