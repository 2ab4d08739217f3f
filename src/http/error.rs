//! HTTP error handling and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::services::composition::CompositionError;
use crate::services::seasonal::SeasonalError;
use crate::services::weekly::PlanningRunError;

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into() }
    }
}

/// Application error type for HTTP handlers.
///
/// Solver failures map to fixed, localisable messages; internal detail
/// stays in the logs.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    CompositionInfeasible,
    SeasonalInfeasible,
    PlanningRunFailure,
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", msg)),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", msg))
            }
            AppError::CompositionInfeasible => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new(
                    "COMPOSITION_INFEASIBLE",
                    "De bezoeken konden niet worden samengesteld binnen de protocolvensters.",
                ),
            ),
            AppError::SeasonalInfeasible => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new(
                    "SEASONAL_INFEASIBLE",
                    "De seizoensplanning kon niet worden opgelost.",
                ),
            ),
            AppError::PlanningRunFailure => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new(
                    "PLANNING_RUN_FAILURE",
                    "De weekplanning leverde geen bruikbare oplossing op.",
                ),
            ),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ApiError::new("INTERNAL_ERROR", msg))
            }
        };
        (status, Json(error)).into_response()
    }
}

impl From<CompositionError> for AppError {
    fn from(err: CompositionError) -> Self {
        match err {
            CompositionError::UnknownProtocol(id) => {
                AppError::BadRequest(format!("unknown protocol id {}", id))
            }
            CompositionError::Infeasible { .. } => {
                tracing::warn!(error = %err, "composition failed");
                AppError::CompositionInfeasible
            }
        }
    }
}

impl From<SeasonalError> for AppError {
    fn from(err: SeasonalError) -> Self {
        tracing::warn!(error = %err, "seasonal planning failed");
        AppError::SeasonalInfeasible
    }
}

impl From<PlanningRunError> for AppError {
    fn from(err: PlanningRunError) -> Self {
        tracing::warn!(error = %err, "weekly planning failed");
        AppError::PlanningRunFailure
    }
}

impl From<crate::db::RepositoryError> for AppError {
    fn from(err: crate::db::RepositoryError) -> Self {
        match err {
            crate::db::RepositoryError::NotFound { entity, id } => {
                AppError::NotFound(format!("{} {} not found", entity, id))
            }
            crate::db::RepositoryError::Validation(msg) => AppError::BadRequest(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}
