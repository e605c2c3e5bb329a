//! Storage abstractions for the fleet service

pub mod memory;
pub mod models;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use models::*;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::FleetError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, FleetError>;

/// Trait for entity CRUD and the derived read models.
///
/// The store is the single source of truth: callers hold no entity state of
/// their own, and every read model reflects the latest committed write.
pub trait FleetStore: Send + Sync {
    /// Insert a new user and return its ID
    fn add_user(
        &self,
        name: &str,
        phone: &str,
        email: Option<&str>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> StoreResult<UserId>;

    /// Get a user by ID
    fn get_user(&self, user_id: UserId) -> StoreResult<Option<User>>;

    /// Insert a station (setup-time load), keeping its given ID
    fn add_station(&self, station: &Station) -> StoreResult<StationId>;

    /// Get a station by ID
    fn get_station(&self, station_id: StationId) -> StoreResult<Option<Station>>;

    /// Insert a new bike and return its ID
    fn add_bike(
        &self,
        name: &str,
        status: BikeStatus,
        last_station: Option<StationId>,
    ) -> StoreResult<BikeId>;

    /// Get a bike by ID
    fn get_bike(&self, bike_id: BikeId) -> StoreResult<Option<Bike>>;

    /// Insert a subscription for a user
    fn add_subscription(
        &self,
        user_id: UserId,
        kind: &str,
        start_time: DateTime<Utc>,
    ) -> StoreResult<SubscriptionId>;

    /// Get a trip by ID
    fn get_trip(&self, trip_id: TripId) -> StoreResult<Option<Trip>>;

    /// All complaints filed against a bike, oldest first
    fn complaints_for_bike(&self, bike_id: BikeId) -> StoreResult<Vec<Complaint>>;

    /// Users sorted alphabetically by name, skipping empty names. A filter
    /// restricts to names containing the substring (case-insensitive).
    fn list_users(&self, name_filter: Option<&str>) -> StoreResult<Vec<User>>;

    /// All bikes with a non-empty name, with their status
    fn list_bikes(&self) -> StoreResult<Vec<Bike>>;

    /// All stations ordered by name
    fn list_stations(&self) -> StoreResult<Vec<Station>>;

    /// Subscription counts grouped by kind, descending by count
    fn subscription_counts(&self) -> StoreResult<Vec<SubscriptionCount>>;

    /// Trips ended at each station; stations with none appear with count 0
    fn station_trip_counts(&self) -> StoreResult<Vec<StationTripCount>>;

    /// Parked bikes at each station, ordered by station then bike name. The
    /// two substring filters are independently optional and AND-composed;
    /// blank filters are ignored.
    fn bikes_at_stations(
        &self,
        station_filter: Option<&str>,
        bike_filter: Option<&str>,
    ) -> StoreResult<Vec<BikeAtStation>>;

    /// Open trips, newest first, optionally restricted to one user
    fn active_trips(&self, user_id: Option<UserId>) -> StoreResult<Vec<ActiveTrip>>;
}

/// Trait for the trip lifecycle operations.
///
/// Each operation is atomic: either every row it touches is committed or none
/// is. Failures come back as typed errors, never as panics.
pub trait TripEngine: Send + Sync {
    /// Start a trip: the bike must be Parked at exactly `station_id` and the
    /// user must have no other open trip. Flips the bike to Active and opens
    /// a trip row in the same transaction.
    fn checkout(
        &self,
        user_id: UserId,
        bike_id: BikeId,
        station_id: StationId,
    ) -> StoreResult<TripId>;

    /// End a trip: the open trip must match both user and bike. If the bike's
    /// open trip belongs to a different user the error names that owner.
    /// Closes the trip and parks the bike at `station_id` atomically.
    fn dropoff(
        &self,
        user_id: UserId,
        bike_id: BikeId,
        station_id: StationId,
    ) -> StoreResult<TripId>;

    /// File one complaint per issue, all sharing `notes`. A non-empty issue
    /// list flips the bike to Missing; an empty list leaves its status alone.
    /// Independent of any trip.
    fn report_issues(
        &self,
        bike_id: BikeId,
        user_id: Option<UserId>,
        issues: &[String],
        notes: Option<&str>,
    ) -> StoreResult<()>;
}
