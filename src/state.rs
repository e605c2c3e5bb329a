//! Shared application state

use crate::facade::Facade;
use crate::store::{FleetStore, TripEngine};

/// State shared by all route handlers. Routes only ever talk to the façade.
pub struct AppState<S> {
    pub facade: Facade<S>,
}

impl<S: FleetStore + TripEngine> AppState<S> {
    pub fn new(store: S) -> Self {
        Self {
            facade: Facade::new(store),
        }
    }
}
