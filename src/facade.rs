//! Application façade
//!
//! Orchestrates engine calls for the UI layer: filter resolution, registration,
//! the dropoff flow state machine and the availability view. Holds no entity
//! state of its own; everything re-reads from the store.

use serde::{Deserialize, Serialize};

use crate::error::FleetError;
use crate::store::{
    ActiveTrip, BikeId, FleetStore, StationId, StoreResult, TripEngine, TripId, UserId,
};
use crate::validation::validate_registration;

/// Query filters threaded explicitly through façade calls.
///
/// Filters are sticky: applying an update replaces only the fields the caller
/// actually supplied, an omitted or blank field keeps its previous value.
/// Clearing is an explicit operation, never a side effect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub user: String,
    pub station: String,
    pub bike: String,
}

/// A partial filter change supplied by the caller
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterUpdate {
    pub user: Option<String>,
    pub station: Option<String>,
    pub bike: Option<String>,
}

impl FilterState {
    /// Fold an update into this state, keeping old values where the update
    /// is absent or blank
    pub fn apply(mut self, update: FilterUpdate) -> Self {
        if let Some(user) = update.user.filter(|f| !f.trim().is_empty()) {
            self.user = user;
        }
        if let Some(station) = update.station.filter(|f| !f.trim().is_empty()) {
            self.station = station;
        }
        if let Some(bike) = update.bike.filter(|f| !f.trim().is_empty()) {
            self.bike = bike;
        }
        self
    }

    /// Reset the analysis-tab filters (station and bike)
    pub fn clear_analysis(mut self) -> Self {
        self.station.clear();
        self.bike.clear();
        self
    }

    fn user_filter(&self) -> Option<&str> {
        Some(self.user.as_str()).filter(|f| !f.is_empty())
    }

    fn station_filter(&self) -> Option<&str> {
        Some(self.station.as_str()).filter(|f| !f.is_empty())
    }

    fn bike_filter(&self) -> Option<&str> {
        Some(self.bike.as_str()).filter(|f| !f.is_empty())
    }
}

/// Which way to read a station's availability percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AvailabilityMode {
    /// Percentage of free slots (a trip is in progress, rider wants to dock)
    FreeSpots,
    /// Percentage of occupied slots (utilization view)
    Occupied,
}

/// Station row of the availability view
#[derive(Debug, Clone, Serialize)]
pub struct StationAvailability {
    pub station_id: StationId,
    pub station_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub availability_percent: i64,
}

/// Availability percentage, rounded to the nearest integer. A zero-capacity
/// station reports 0% rather than dividing by zero.
fn availability_percent(max_parking: i64, available_parking: i64, mode: AvailabilityMode) -> i64 {
    if max_parking <= 0 {
        tracing::warn!(max_parking, "Station with no parking capacity in availability view");
        return 0;
    }
    let free = available_parking as f64 / max_parking as f64 * 100.0;
    match mode {
        AvailabilityMode::FreeSpots => free.round() as i64,
        AvailabilityMode::Occupied => (100.0 - free).round() as i64,
    }
}

/// Registration request for a new rider
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Everything the dashboard tab shows
#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    pub users: Vec<crate::store::User>,
    pub bikes: Vec<crate::store::Bike>,
    pub subscriptions: Vec<crate::store::SubscriptionCount>,
}

/// Everything the analysis tab shows
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisData {
    pub station_trips: Vec<crate::store::StationTripCount>,
    pub bikes_at_stations: Vec<crate::store::BikeAtStation>,
}

/// The dropoff wizard as an explicit value object, passed between calls
/// instead of living in ambient session state.
///
/// `SelectUser → DropoffDone → ReportingIssues → SelectUser`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropoffFlow {
    /// Waiting for the rider to pick user/bike/station
    SelectUser,
    /// Trip closed, asking whether anything went wrong
    DropoffDone {
        user_id: UserId,
        bike_id: BikeId,
        trip_id: TripId,
    },
    /// Rider chose to file issues against the returned bike
    ReportingIssues { user_id: UserId, bike_id: BikeId },
}

impl DropoffFlow {
    pub fn begin() -> Self {
        DropoffFlow::SelectUser
    }
}

/// The application façade, generic over the store the same way the route
/// handlers are
pub struct Facade<S> {
    store: S,
}

impl<S: FleetStore + TripEngine> Facade<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Direct access to the underlying store (setup-time loads, tests)
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Dashboard tab: users under the current filter, bikes, subscription mix
    pub fn dashboard(&self, filters: &FilterState) -> StoreResult<DashboardData> {
        Ok(DashboardData {
            users: self.store.list_users(filters.user_filter())?,
            bikes: self.store.list_bikes()?,
            subscriptions: self.store.subscription_counts()?,
        })
    }

    /// Analysis tab: trips per station and parked bikes under the filters
    pub fn analysis(&self, filters: &FilterState) -> StoreResult<AnalysisData> {
        Ok(AnalysisData {
            station_trips: self.store.station_trip_counts()?,
            bikes_at_stations: self
                .store
                .bikes_at_stations(filters.station_filter(), filters.bike_filter())?,
        })
    }

    /// Validate and register a new rider. All three field checks run before
    /// any of them can fail the registration.
    pub fn register_user(&self, reg: &Registration) -> StoreResult<UserId> {
        let check = validate_registration(&reg.name, &reg.email, &reg.phone);
        if !check.all_valid() {
            return Err(FleetError::InvalidRegistration(check));
        }

        let user_id = self.store.add_user(
            &reg.name,
            &reg.phone,
            Some(&reg.email),
            reg.latitude,
            reg.longitude,
        )?;
        tracing::info!(%user_id, "Registered new user");
        Ok(user_id)
    }

    pub fn checkout(
        &self,
        user_id: UserId,
        bike_id: BikeId,
        station_id: StationId,
    ) -> StoreResult<TripId> {
        self.store.checkout(user_id, bike_id, station_id)
    }

    pub fn dropoff(
        &self,
        user_id: UserId,
        bike_id: BikeId,
        station_id: StationId,
    ) -> StoreResult<TripId> {
        self.store.dropoff(user_id, bike_id, station_id)
    }

    pub fn report_issues(
        &self,
        bike_id: BikeId,
        user_id: Option<UserId>,
        issues: &[String],
        notes: Option<&str>,
    ) -> StoreResult<()> {
        self.store.report_issues(bike_id, user_id, issues, notes)
    }

    pub fn active_trips(&self, user_id: Option<UserId>) -> StoreResult<Vec<ActiveTrip>> {
        self.store.active_trips(user_id)
    }

    /// All stations, ordered by name (station pickers, map view)
    pub fn stations(&self) -> StoreResult<Vec<crate::store::Station>> {
        self.store.list_stations()
    }

    /// Per-station availability percentage under the requested mode
    pub fn station_availability(
        &self,
        mode: AvailabilityMode,
    ) -> StoreResult<Vec<StationAvailability>> {
        let stations = self.store.list_stations()?;
        Ok(stations
            .into_iter()
            .map(|s| StationAvailability {
                station_id: s.id,
                station_name: s.name,
                latitude: s.latitude,
                longitude: s.longitude,
                availability_percent: availability_percent(s.max_parking, s.available_parking, mode),
            })
            .collect())
    }

    /// Flow step: close the trip. Valid only from `SelectUser`.
    pub fn dropoff_step(
        &self,
        flow: DropoffFlow,
        user_id: UserId,
        bike_id: BikeId,
        station_id: StationId,
    ) -> StoreResult<DropoffFlow> {
        match flow {
            DropoffFlow::SelectUser => {
                let trip_id = self.dropoff(user_id, bike_id, station_id)?;
                Ok(DropoffFlow::DropoffDone {
                    user_id,
                    bike_id,
                    trip_id,
                })
            }
            _ => Err(FleetError::WrongFlowStep {
                expected: "select user",
            }),
        }
    }

    /// Flow step: the rider wants to file issues against the returned bike
    pub fn begin_report(&self, flow: DropoffFlow) -> StoreResult<DropoffFlow> {
        match flow {
            DropoffFlow::DropoffDone {
                user_id, bike_id, ..
            } => Ok(DropoffFlow::ReportingIssues { user_id, bike_id }),
            _ => Err(FleetError::WrongFlowStep {
                expected: "dropoff done",
            }),
        }
    }

    /// Flow step: nothing was wrong, the wizard starts over
    pub fn skip_report(&self, flow: DropoffFlow) -> StoreResult<DropoffFlow> {
        match flow {
            DropoffFlow::DropoffDone { .. } => Ok(DropoffFlow::SelectUser),
            _ => Err(FleetError::WrongFlowStep {
                expected: "dropoff done",
            }),
        }
    }

    /// Flow step: file the selected issues and finish the wizard
    pub fn finish_report(
        &self,
        flow: DropoffFlow,
        issues: &[String],
        notes: Option<&str>,
    ) -> StoreResult<DropoffFlow> {
        match flow {
            DropoffFlow::ReportingIssues { user_id, bike_id } => {
                self.report_issues(bike_id, Some(user_id), issues, notes)?;
                Ok(DropoffFlow::SelectUser)
            }
            _ => Err(FleetError::WrongFlowStep {
                expected: "reporting issues",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BikeStatus, InMemoryStore, Station};

    fn facade_with_station() -> (Facade<InMemoryStore>, StationId) {
        let facade = Facade::new(InMemoryStore::new());
        let station = facade
            .store()
            .add_station(&Station {
                id: StationId(1),
                name: "Sentrum".to_string(),
                latitude: 58.97,
                longitude: 5.73,
                max_parking: 10,
                available_parking: 3,
            })
            .unwrap();
        (facade, station)
    }

    #[test]
    fn test_sticky_filters() {
        let state = FilterState::default().apply(FilterUpdate {
            user: Some("Ole".to_string()),
            station: Some("Sentrum".to_string()),
            bike: None,
        });
        assert_eq!(state.user, "Ole");
        assert_eq!(state.station, "Sentrum");

        // Omitted and blank updates keep the previous values
        let state = state.apply(FilterUpdate {
            user: None,
            station: Some("  ".to_string()),
            bike: Some("Lynet".to_string()),
        });
        assert_eq!(state.user, "Ole");
        assert_eq!(state.station, "Sentrum");
        assert_eq!(state.bike, "Lynet");

        // Clearing is explicit and leaves the user filter alone
        let state = state.clear_analysis();
        assert_eq!(state.user, "Ole");
        assert!(state.station.is_empty());
        assert!(state.bike.is_empty());
    }

    #[test]
    fn test_availability_percentages() {
        assert_eq!(availability_percent(10, 3, AvailabilityMode::FreeSpots), 30);
        assert_eq!(availability_percent(10, 3, AvailabilityMode::Occupied), 70);
        assert_eq!(availability_percent(3, 1, AvailabilityMode::FreeSpots), 33);
        assert_eq!(availability_percent(3, 1, AvailabilityMode::Occupied), 67);
        // Zero-capacity stations report 0% instead of dividing by zero
        assert_eq!(availability_percent(0, 0, AvailabilityMode::FreeSpots), 0);
        assert_eq!(availability_percent(0, 0, AvailabilityMode::Occupied), 0);
    }

    #[test]
    fn test_station_availability_view() {
        let (facade, _) = facade_with_station();

        let rows = facade
            .station_availability(AvailabilityMode::Occupied)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].availability_percent, 70);

        let rows = facade
            .station_availability(AvailabilityMode::FreeSpots)
            .unwrap();
        assert_eq!(rows[0].availability_percent, 30);
    }

    #[test]
    fn test_registration_requires_all_fields_valid() {
        let (facade, _) = facade_with_station();

        let result = facade.register_user(&Registration {
            name: "Ole123".to_string(),
            phone: "12345678".to_string(),
            email: "ole@example.com".to_string(),
            latitude: None,
            longitude: None,
        });
        match result {
            Err(FleetError::InvalidRegistration(check)) => {
                assert!(!check.name_valid);
                assert!(check.email_valid);
                assert!(check.phone_valid);
            }
            other => panic!("expected validation failure, got {:?}", other),
        }

        let user_id = facade
            .register_user(&Registration {
                name: "Ole Hansen".to_string(),
                phone: "12345678".to_string(),
                email: "ole@example.com".to_string(),
                latitude: Some(58.97),
                longitude: Some(5.73),
            })
            .unwrap();
        let user = facade.store().get_user(user_id).unwrap().unwrap();
        assert_eq!(user.email.as_deref(), Some("ole@example.com"));
    }

    #[test]
    fn test_dropoff_flow_with_issue_report() {
        let (facade, station) = facade_with_station();
        let user = facade
            .register_user(&Registration {
                name: "Ole Hansen".to_string(),
                phone: "12345678".to_string(),
                email: "ole@example.com".to_string(),
                latitude: None,
                longitude: None,
            })
            .unwrap();
        let bike = facade
            .store()
            .add_bike("Lynet", BikeStatus::Parked, Some(station))
            .unwrap();

        facade.checkout(user, bike, station).unwrap();

        let flow = DropoffFlow::begin();
        let flow = facade.dropoff_step(flow, user, bike, station).unwrap();
        assert!(matches!(flow, DropoffFlow::DropoffDone { .. }));

        let flow = facade.begin_report(flow).unwrap();
        let issues = vec!["Flat tire".to_string(), "Brake issues".to_string()];
        let flow = facade.finish_report(flow, &issues, Some("rear brake")).unwrap();
        assert_eq!(flow, DropoffFlow::SelectUser);

        // Dropoff succeeded, but the report overrides Parked with Missing
        let bike_row = facade.store().get_bike(bike).unwrap().unwrap();
        assert_eq!(bike_row.status, BikeStatus::Missing);
        assert_eq!(facade.store().complaints_for_bike(bike).unwrap().len(), 2);
    }

    #[test]
    fn test_flow_rejects_out_of_order_steps() {
        let (facade, station) = facade_with_station();
        let user = facade
            .store()
            .add_user("Ole Hansen", "12345678", None, None, None)
            .unwrap();
        let bike = facade
            .store()
            .add_bike("Lynet", BikeStatus::Parked, Some(station))
            .unwrap();
        facade.checkout(user, bike, station).unwrap();

        // Can't report before the trip is closed
        let result = facade.begin_report(DropoffFlow::SelectUser);
        assert!(matches!(result, Err(FleetError::WrongFlowStep { .. })));

        let flow = facade
            .dropoff_step(DropoffFlow::begin(), user, bike, station)
            .unwrap();

        // Can't run a second dropoff from the done state
        let result = facade.dropoff_step(flow, user, bike, station);
        assert!(matches!(result, Err(FleetError::WrongFlowStep { .. })));

        // Skipping the report finishes the wizard
        assert_eq!(facade.skip_report(flow).unwrap(), DropoffFlow::SelectUser);
    }

    #[test]
    fn test_dashboard_and_analysis_use_filters() {
        let (facade, station) = facade_with_station();
        facade
            .store()
            .add_user("Ole Hansen", "12345678", None, None, None)
            .unwrap();
        facade
            .store()
            .add_user("Kari Olsen", "87654321", None, None, None)
            .unwrap();
        facade
            .store()
            .add_bike("Lynet", BikeStatus::Parked, Some(station))
            .unwrap();

        let filters = FilterState::default().apply(FilterUpdate {
            user: Some("Kari".to_string()),
            station: None,
            bike: None,
        });

        let dashboard = facade.dashboard(&filters).unwrap();
        assert_eq!(dashboard.users.len(), 1);
        assert_eq!(dashboard.users[0].name, "Kari Olsen");
        assert_eq!(dashboard.bikes.len(), 1);

        let analysis = facade.analysis(&filters).unwrap();
        assert_eq!(analysis.station_trips.len(), 1);
        assert_eq!(analysis.bikes_at_stations.len(), 1);
    }
}
