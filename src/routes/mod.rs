//! HTTP routes for the fleet service

mod bikes;
mod dashboard;
mod stations;
mod trips;
mod users;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;
use crate::store::{FleetStore, TripEngine};

/// Create the router with all routes
pub fn create_router<S>(state: Arc<AppState<S>>) -> Router
where
    S: FleetStore + TripEngine + 'static,
{
    Router::new()
        .route("/api/register", post(users::register))
        .route("/api/checkout", post(trips::checkout))
        .route("/api/dropoff", post(trips::dropoff))
        .route("/api/report_issues", post(bikes::report_issues))
        .route("/api/active_trips", get(trips::active_trips))
        .route("/api/dashboard", get(dashboard::dashboard))
        .route("/api/analysis", get(dashboard::analysis))
        .route("/api/stations", get(stations::list))
        .route("/api/station_availability", get(stations::availability))
        .with_state(state)
}
