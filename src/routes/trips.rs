//! Trip lifecycle endpoints

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::FleetError;
use crate::state::AppState;
use crate::store::{ActiveTrip, BikeId, FleetStore, StationId, TripEngine, TripId, UserId};

#[derive(Deserialize)]
pub struct TripRequest {
    pub user_id: UserId,
    pub bike_id: BikeId,
    pub station_id: StationId,
}

#[derive(Serialize)]
pub struct TripResponse {
    pub success: bool,
    pub trip_id: TripId,
}

/// POST /api/checkout
pub async fn checkout<S>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<TripRequest>,
) -> Result<Json<TripResponse>, FleetError>
where
    S: FleetStore + TripEngine,
{
    let trip_id = state
        .facade
        .checkout(req.user_id, req.bike_id, req.station_id)?;

    Ok(Json(TripResponse {
        success: true,
        trip_id,
    }))
}

/// POST /api/dropoff
pub async fn dropoff<S>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<TripRequest>,
) -> Result<Json<TripResponse>, FleetError>
where
    S: FleetStore + TripEngine,
{
    let trip_id = state
        .facade
        .dropoff(req.user_id, req.bike_id, req.station_id)?;

    Ok(Json(TripResponse {
        success: true,
        trip_id,
    }))
}

#[derive(Deserialize)]
pub struct ActiveTripsParams {
    pub user_id: Option<UserId>,
}

/// GET /api/active_trips?user_id=
pub async fn active_trips<S>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<ActiveTripsParams>,
) -> Result<Json<Vec<ActiveTrip>>, FleetError>
where
    S: FleetStore + TripEngine,
{
    Ok(Json(state.facade.active_trips(params.user_id)?))
}
