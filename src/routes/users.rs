//! User registration endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::FleetError;
use crate::facade::Registration;
use crate::state::AppState;
use crate::store::{FleetStore, TripEngine, UserId};

#[derive(Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub user_id: UserId,
}

/// POST /api/register
///
/// Validates the three registration fields and creates the user when all of
/// them pass. A failing field comes back as a 400 naming every invalid field.
pub async fn register<S>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<Registration>,
) -> Result<Json<RegisterResponse>, FleetError>
where
    S: FleetStore + TripEngine,
{
    let user_id = state.facade.register_user(&req)?;

    Ok(Json(RegisterResponse {
        success: true,
        user_id,
    }))
}
