//! Station endpoints

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::error::FleetError;
use crate::facade::{AvailabilityMode, StationAvailability};
use crate::state::AppState;
use crate::store::{FleetStore, Station, TripEngine};

/// GET /api/stations
pub async fn list<S>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Station>>, FleetError>
where
    S: FleetStore + TripEngine,
{
    Ok(Json(state.facade.stations()?))
}

#[derive(Deserialize)]
pub struct AvailabilityParams {
    /// With a trip in progress the rider cares about free slots; otherwise
    /// the view shows utilization
    #[serde(default)]
    pub in_progress: bool,
}

/// GET /api/station_availability?in_progress=
pub async fn availability<S>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<Vec<StationAvailability>>, FleetError>
where
    S: FleetStore + TripEngine,
{
    let mode = if params.in_progress {
        AvailabilityMode::FreeSpots
    } else {
        AvailabilityMode::Occupied
    };

    Ok(Json(state.facade.station_availability(mode)?))
}
