//! Fleet error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::store::{BikeId, StationId, UserId};
use crate::validation::RegistrationCheck;

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("Bike with ID {0} not found")]
    BikeNotFound(BikeId),

    #[error("User with ID {0} not found")]
    UserNotFound(UserId),

    #[error("Station with ID {0} not found")]
    StationNotFound(StationId),

    #[error("Bike is not available at this station")]
    BikeNotAvailable,

    #[error("User already has an active trip")]
    UserHasActiveTrip,

    #[error("No active trip found for this user and bike")]
    NoActiveTrip,

    #[error("This bike is currently checked out by user {owner}")]
    CheckedOutByOther { owner: UserId },

    #[error("Dropoff flow is not at the {expected} step")]
    WrongFlowStep { expected: &'static str },

    #[error("Validation failed: {0}")]
    InvalidRegistration(RegistrationCheck),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl FleetError {
    /// Wrap a rusqlite error as a storage failure
    pub(crate) fn storage(e: rusqlite::Error) -> Self {
        FleetError::Storage(e.to_string())
    }
}

impl IntoResponse for FleetError {
    fn into_response(self) -> Response {
        let status = match &self {
            FleetError::BikeNotFound(_)
            | FleetError::UserNotFound(_)
            | FleetError::StationNotFound(_) => StatusCode::NOT_FOUND,
            FleetError::BikeNotAvailable
            | FleetError::UserHasActiveTrip
            | FleetError::NoActiveTrip
            | FleetError::CheckedOutByOther { .. }
            | FleetError::WrongFlowStep { .. } => StatusCode::CONFLICT,
            FleetError::InvalidRegistration(_) => StatusCode::BAD_REQUEST,
            FleetError::Storage(msg) => {
                tracing::error!("Storage error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = json!({ "success": false, "reason": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
