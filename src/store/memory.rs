//! In-memory storage implementation

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use super::{
    ActiveTrip, Bike, BikeAtStation, BikeId, BikeStatus, Complaint, ComplaintId, FleetStore,
    Station, StationId, StationTripCount, StoreResult, Subscription, SubscriptionCount,
    SubscriptionId, Trip, TripEngine, TripId, User, UserId,
};
use crate::error::FleetError;

#[derive(Default)]
struct Inner {
    users: BTreeMap<UserId, User>,
    stations: BTreeMap<StationId, Station>,
    bikes: BTreeMap<BikeId, Bike>,
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    trips: BTreeMap<TripId, Trip>,
    complaints: BTreeMap<ComplaintId, Complaint>,
    next_id: i64,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory store implementing both FleetStore and TripEngine.
///
/// One lock around all tables: a write guard spans each lifecycle operation,
/// which gives the same atomicity the SQLite transactions do.
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn effective_filter(filter: Option<&str>) -> Option<String> {
    filter
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
}

impl FleetStore for InMemoryStore {
    fn add_user(
        &self,
        name: &str,
        phone: &str,
        email: Option<&str>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> StoreResult<UserId> {
        let mut inner = self.inner.write().unwrap();
        let id = UserId(inner.next_id());
        inner.users.insert(
            id,
            User {
                id,
                name: name.to_string(),
                phone: phone.to_string(),
                email: email.map(str::to_string),
                latitude,
                longitude,
            },
        );
        Ok(id)
    }

    fn get_user(&self, user_id: UserId) -> StoreResult<Option<User>> {
        Ok(self.inner.read().unwrap().users.get(&user_id).cloned())
    }

    fn add_station(&self, station: &Station) -> StoreResult<StationId> {
        let mut inner = self.inner.write().unwrap();
        inner.stations.insert(station.id, station.clone());
        Ok(station.id)
    }

    fn get_station(&self, station_id: StationId) -> StoreResult<Option<Station>> {
        Ok(self.inner.read().unwrap().stations.get(&station_id).cloned())
    }

    fn add_bike(
        &self,
        name: &str,
        status: BikeStatus,
        last_station: Option<StationId>,
    ) -> StoreResult<BikeId> {
        let mut inner = self.inner.write().unwrap();
        if let Some(station) = last_station {
            if !inner.stations.contains_key(&station) {
                return Err(FleetError::Storage(format!(
                    "bike references missing station {station}"
                )));
            }
        }
        let id = BikeId(inner.next_id());
        inner.bikes.insert(
            id,
            Bike {
                id,
                name: name.to_string(),
                status,
                last_station,
            },
        );
        Ok(id)
    }

    fn get_bike(&self, bike_id: BikeId) -> StoreResult<Option<Bike>> {
        Ok(self.inner.read().unwrap().bikes.get(&bike_id).cloned())
    }

    fn add_subscription(
        &self,
        user_id: UserId,
        kind: &str,
        start_time: DateTime<Utc>,
    ) -> StoreResult<SubscriptionId> {
        let mut inner = self.inner.write().unwrap();
        if !inner.users.contains_key(&user_id) {
            return Err(FleetError::UserNotFound(user_id));
        }
        let id = SubscriptionId(inner.next_id());
        inner.subscriptions.insert(
            id,
            Subscription {
                id,
                user_id,
                kind: kind.to_string(),
                start_time,
            },
        );
        Ok(id)
    }

    fn get_trip(&self, trip_id: TripId) -> StoreResult<Option<Trip>> {
        Ok(self.inner.read().unwrap().trips.get(&trip_id).cloned())
    }

    fn complaints_for_bike(&self, bike_id: BikeId) -> StoreResult<Vec<Complaint>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .complaints
            .values()
            .filter(|c| c.bike_id == bike_id)
            .cloned()
            .collect())
    }

    fn list_users(&self, name_filter: Option<&str>) -> StoreResult<Vec<User>> {
        let inner = self.inner.read().unwrap();
        let filter = effective_filter(name_filter);
        let mut users: Vec<User> = inner
            .users
            .values()
            .filter(|u| !u.name.is_empty())
            .filter(|u| filter.as_deref().is_none_or(|f| contains_ci(&u.name, f)))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    fn list_bikes(&self) -> StoreResult<Vec<Bike>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .bikes
            .values()
            .filter(|b| !b.name.is_empty())
            .cloned()
            .collect())
    }

    fn list_stations(&self) -> StoreResult<Vec<Station>> {
        let inner = self.inner.read().unwrap();
        let mut stations: Vec<Station> = inner.stations.values().cloned().collect();
        stations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(stations)
    }

    fn subscription_counts(&self) -> StoreResult<Vec<SubscriptionCount>> {
        let inner = self.inner.read().unwrap();
        let mut by_kind: BTreeMap<String, i64> = BTreeMap::new();
        for sub in inner.subscriptions.values() {
            *by_kind.entry(sub.kind.clone()).or_default() += 1;
        }
        let mut counts: Vec<SubscriptionCount> = by_kind
            .into_iter()
            .map(|(kind, purchased)| SubscriptionCount { kind, purchased })
            .collect();
        counts.sort_by(|a, b| b.purchased.cmp(&a.purchased));
        Ok(counts)
    }

    fn station_trip_counts(&self) -> StoreResult<Vec<StationTripCount>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .stations
            .values()
            .map(|s| StationTripCount {
                station_id: s.id,
                station_name: s.name.clone(),
                trips: inner
                    .trips
                    .values()
                    .filter(|t| t.end_station_id == Some(s.id))
                    .count() as i64,
            })
            .collect())
    }

    fn bikes_at_stations(
        &self,
        station_filter: Option<&str>,
        bike_filter: Option<&str>,
    ) -> StoreResult<Vec<BikeAtStation>> {
        let inner = self.inner.read().unwrap();
        let station_filter = effective_filter(station_filter);
        let bike_filter = effective_filter(bike_filter);

        let mut rows: Vec<BikeAtStation> = inner
            .bikes
            .values()
            .filter(|b| b.status == BikeStatus::Parked)
            .filter_map(|b| {
                let station = inner.stations.get(&b.last_station?)?;
                Some(BikeAtStation {
                    station_id: station.id,
                    station_name: station.name.clone(),
                    bike_id: b.id,
                    bike_name: b.name.clone(),
                    status: b.status,
                })
            })
            .filter(|row| {
                station_filter
                    .as_deref()
                    .is_none_or(|f| contains_ci(&row.station_name, f))
                    && bike_filter
                        .as_deref()
                        .is_none_or(|f| contains_ci(&row.bike_name, f))
            })
            .collect();
        rows.sort_by(|a, b| {
            (a.station_name.as_str(), a.bike_name.as_str())
                .cmp(&(b.station_name.as_str(), b.bike_name.as_str()))
        });
        Ok(rows)
    }

    fn active_trips(&self, user_id: Option<UserId>) -> StoreResult<Vec<ActiveTrip>> {
        let inner = self.inner.read().unwrap();
        let mut trips: Vec<ActiveTrip> = inner
            .trips
            .values()
            .filter(|t| t.is_open())
            .filter(|t| user_id.is_none_or(|u| t.user_id == u))
            .filter_map(|t| {
                let bike = inner.bikes.get(&t.bike_id)?;
                let station = inner.stations.get(&t.start_station_id)?;
                Some(ActiveTrip {
                    trip_id: t.id,
                    user_id: t.user_id,
                    bike_id: t.bike_id,
                    bike_name: bike.name.clone(),
                    start_station_id: t.start_station_id,
                    start_station_name: station.name.clone(),
                    start_time: t.start_time,
                })
            })
            .collect();
        trips.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(trips)
    }
}

impl TripEngine for InMemoryStore {
    fn checkout(
        &self,
        user_id: UserId,
        bike_id: BikeId,
        station_id: StationId,
    ) -> StoreResult<TripId> {
        let mut inner = self.inner.write().unwrap();

        if inner
            .trips
            .values()
            .any(|t| t.user_id == user_id && t.is_open())
        {
            return Err(FleetError::UserHasActiveTrip);
        }

        let bike = inner
            .bikes
            .get(&bike_id)
            .ok_or(FleetError::BikeNotFound(bike_id))?;
        if bike.status != BikeStatus::Parked || bike.last_station != Some(station_id) {
            return Err(FleetError::BikeNotAvailable);
        }

        let trip_id = TripId(inner.next_id());
        inner.trips.insert(
            trip_id,
            Trip {
                id: trip_id,
                user_id,
                bike_id,
                start_station_id: station_id,
                end_station_id: None,
                start_time: Utc::now(),
                end_time: None,
            },
        );
        // The guard is still held, so the flip is atomic with the insert
        if let Some(bike) = inner.bikes.get_mut(&bike_id) {
            bike.status = BikeStatus::Active;
        }

        tracing::info!(%user_id, %bike_id, %station_id, %trip_id, "Checkout complete");
        Ok(trip_id)
    }

    fn dropoff(
        &self,
        user_id: UserId,
        bike_id: BikeId,
        station_id: StationId,
    ) -> StoreResult<TripId> {
        let mut inner = self.inner.write().unwrap();

        let trip_id = match inner
            .trips
            .values()
            .filter(|t| t.is_open() && t.bike_id == bike_id)
            .max_by_key(|t| t.start_time)
        {
            Some(trip) if trip.user_id == user_id => trip.id,
            Some(trip) => {
                return Err(FleetError::CheckedOutByOther {
                    owner: trip.user_id,
                })
            }
            None => return Err(FleetError::NoActiveTrip),
        };

        if !inner.stations.contains_key(&station_id) {
            return Err(FleetError::StationNotFound(station_id));
        }

        let now = Utc::now();
        if let Some(trip) = inner.trips.get_mut(&trip_id) {
            trip.end_station_id = Some(station_id);
            trip.end_time = Some(now);
        }

        let bike = inner
            .bikes
            .get_mut(&bike_id)
            .ok_or(FleetError::BikeNotFound(bike_id))?;
        bike.status = BikeStatus::Parked;
        bike.last_station = Some(station_id);

        tracing::info!(%user_id, %bike_id, %station_id, %trip_id, "Dropoff complete");
        Ok(trip_id)
    }

    fn report_issues(
        &self,
        bike_id: BikeId,
        user_id: Option<UserId>,
        issues: &[String],
        notes: Option<&str>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().unwrap();

        if !inner.bikes.contains_key(&bike_id) {
            return Err(FleetError::BikeNotFound(bike_id));
        }

        for issue in issues {
            let id = ComplaintId(inner.next_id());
            inner.complaints.insert(
                id,
                Complaint {
                    id,
                    bike_id,
                    user_id,
                    complaint_type: issue.clone(),
                    notes: notes.map(str::to_string),
                },
            );
        }

        if !issues.is_empty() {
            if let Some(bike) = inner.bikes.get_mut(&bike_id) {
                bike.status = BikeStatus::Missing;
            }
            tracing::warn!(%bike_id, count = issues.len(), "Bike flagged Missing after issue report");
        }

        Ok(())
    }
}
