//! Bike issue reporting endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::FleetError;
use crate::state::AppState;
use crate::store::{BikeId, FleetStore, TripEngine, UserId};

#[derive(Deserialize)]
pub struct ReportIssuesRequest {
    pub bike_id: BikeId,
    pub user_id: Option<UserId>,
    pub issues: Vec<String>,
    pub notes: Option<String>,
}

#[derive(Serialize)]
pub struct ReportIssuesResponse {
    pub success: bool,
}

/// POST /api/report_issues
///
/// Files one complaint per issue. A non-empty issue list flags the bike
/// Missing regardless of any trip state.
pub async fn report_issues<S>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<ReportIssuesRequest>,
) -> Result<Json<ReportIssuesResponse>, FleetError>
where
    S: FleetStore + TripEngine,
{
    state
        .facade
        .report_issues(req.bike_id, req.user_id, &req.issues, req.notes.as_deref())?;

    Ok(Json(ReportIssuesResponse { success: true }))
}
