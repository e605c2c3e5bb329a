//! Dashboard and analysis tab endpoints
//!
//! Filters arrive as query parameters each call; the sticky behavior lives in
//! the caller's `FilterState`, not in any server-side session.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;

use crate::error::FleetError;
use crate::facade::{AnalysisData, DashboardData, FilterState, FilterUpdate};
use crate::state::AppState;
use crate::store::{FleetStore, TripEngine};

/// GET /api/dashboard?user=
pub async fn dashboard<S>(
    State(state): State<Arc<AppState<S>>>,
    Query(update): Query<FilterUpdate>,
) -> Result<Json<DashboardData>, FleetError>
where
    S: FleetStore + TripEngine,
{
    let filters = FilterState::default().apply(update);
    Ok(Json(state.facade.dashboard(&filters)?))
}

/// GET /api/analysis?station=&bike=
pub async fn analysis<S>(
    State(state): State<Arc<AppState<S>>>,
    Query(update): Query<FilterUpdate>,
) -> Result<Json<AnalysisData>, FleetError>
where
    S: FleetStore + TripEngine,
{
    let filters = FilterState::default().apply(update);
    Ok(Json(state.facade.analysis(&filters)?))
}
