//! HTTP API handlers
//!
//! Every error body is `{"error": string}`. Storage details are logged,
//! never returned.

pub mod availability;
pub mod days;
pub mod health;
pub mod publishers;
pub mod shifts;

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::error::RosterError;

pub use availability::availability_routes;
pub use days::day_routes;
pub use health::health_routes;
pub use publishers::publisher_routes;
pub use shifts::shift_routes;

/// Error returned by every handler
#[derive(Debug)]
pub struct ApiError(pub RosterError);

impl From<RosterError> for ApiError {
    fn from(err: RosterError) -> Self {
        ApiError(err)
    }
}

impl From<poc_common::Error> for ApiError {
    fn from(err: poc_common::Error) -> Self {
        ApiError(err.into())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(RosterError::Validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError(RosterError::Validation(rejection.body_text()))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            RosterError::NotFound(_) => StatusCode::NOT_FOUND,
            RosterError::Rejected(r) if r.is_not_found() => StatusCode::NOT_FOUND,
            RosterError::Rejected(_)
            | RosterError::Validation(_)
            | RosterError::CapacityExceeded { .. }
            | RosterError::Locked(_) => StatusCode::BAD_REQUEST,
            RosterError::Conflict(_) => StatusCode::CONFLICT,
            RosterError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            RosterError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            RosterError::Internal(detail) => {
                error!("Internal error: {}", detail);
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
