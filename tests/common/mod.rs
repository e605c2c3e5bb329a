//! Common test utilities for fleet service integration tests

use std::sync::Arc;

use axum_test::TestServer;
use bysykkel::store::{BikeId, BikeStatus, FleetStore, Station, StationId, UserId};
use bysykkel::{routes, AppState, InMemoryStore};

/// Create a test server over a fresh in-memory store, returning the state so
/// tests can seed and inspect it directly
pub fn create_test_server() -> (TestServer, Arc<AppState<InMemoryStore>>) {
    let state = Arc::new(AppState::new(InMemoryStore::new()));
    let app = routes::create_router(state.clone());
    let server = TestServer::new(app).expect("Failed to create test server");

    (server, state)
}

pub fn seed_station(
    state: &AppState<InMemoryStore>,
    id: i64,
    name: &str,
    max_parking: i64,
    available_parking: i64,
) -> StationId {
    state
        .facade
        .store()
        .add_station(&Station {
            id: StationId(id),
            name: name.to_string(),
            latitude: 58.97,
            longitude: 5.73,
            max_parking,
            available_parking,
        })
        .unwrap()
}

pub fn seed_user(state: &AppState<InMemoryStore>, name: &str, phone: &str) -> UserId {
    state
        .facade
        .store()
        .add_user(name, phone, None, None, None)
        .unwrap()
}

pub fn seed_parked_bike(
    state: &AppState<InMemoryStore>,
    name: &str,
    station: StationId,
) -> BikeId {
    state
        .facade
        .store()
        .add_bike(name, BikeStatus::Parked, Some(station))
        .unwrap()
}
