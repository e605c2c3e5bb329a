//! Bysykkel Fleet Service
//!
//! City-bike fleet management: users, bikes, stations, subscriptions and
//! trips in a durable store, with a transactional trip engine and a small
//! JSON API for checkout/dropoff workflows and availability views.

pub mod config;
pub mod error;
pub mod facade;
pub mod routes;
pub mod state;
pub mod store;
pub mod validation;

pub use config::Config;
pub use error::FleetError;
pub use facade::{
    AvailabilityMode, DropoffFlow, Facade, FilterState, FilterUpdate, Registration,
};
pub use state::AppState;
pub use store::{FleetStore, InMemoryStore, SqliteStore, TripEngine};
pub use validation::{validate_registration, RegistrationCheck};
