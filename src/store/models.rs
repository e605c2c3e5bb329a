//! Data models for fleet storage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_type!(
    /// Unique user identifier
    UserId
);
id_type!(
    /// Unique bike identifier
    BikeId
);
id_type!(
    /// Unique station identifier
    StationId
);
id_type!(
    /// Unique trip identifier
    TripId
);
id_type!(
    /// Unique subscription identifier
    SubscriptionId
);
id_type!(
    /// Unique complaint identifier
    ComplaintId
);

/// Lifecycle state of a bike. The three states are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BikeStatus {
    /// Docked at a station (`last_station` says where)
    Parked,
    /// Out on an open trip
    Active,
    /// Reported missing or broken via a complaint
    Missing,
}

impl BikeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BikeStatus::Parked => "Parked",
            BikeStatus::Active => "Active",
            BikeStatus::Missing => "Missing",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Parked" => Some(BikeStatus::Parked),
            "Active" => Some(BikeStatus::Active),
            "Missing" => Some(BikeStatus::Missing),
            _ => None,
        }
    }
}

/// A registered rider
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A docking station. Capacity fields come from the setup-time load and are a
/// stored snapshot, not recomputed per trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub max_parking: i64,
    pub available_parking: i64,
}

/// A bike. `last_station` locates the bike only while it is Parked.
#[derive(Debug, Clone, Serialize)]
pub struct Bike {
    pub id: BikeId,
    pub name: String,
    pub status: BikeStatus,
    pub last_station: Option<StationId>,
}

/// A subscription purchased by a user
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub kind: String,
    pub start_time: DateTime<Utc>,
}

/// A trip. Open while `end_time` is None; at most one open trip per bike.
#[derive(Debug, Clone, Serialize)]
pub struct Trip {
    pub id: TripId,
    pub user_id: UserId,
    pub bike_id: BikeId,
    pub start_station_id: StationId,
    pub end_station_id: Option<StationId>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Trip {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// An issue reported against a bike
#[derive(Debug, Clone, Serialize)]
pub struct Complaint {
    pub id: ComplaintId,
    pub bike_id: BikeId,
    pub user_id: Option<UserId>,
    pub complaint_type: String,
    pub notes: Option<String>,
}

/// Row of the subscription-counts read model, descending by count
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionCount {
    pub kind: String,
    pub purchased: i64,
}

/// Row of the trips-per-station read model. Counts trips whose end station is
/// this station; stations with no ended trips appear with a zero count.
#[derive(Debug, Clone, Serialize)]
pub struct StationTripCount {
    pub station_id: StationId,
    pub station_name: String,
    pub trips: i64,
}

/// A Parked bike joined to the station it is docked at
#[derive(Debug, Clone, Serialize)]
pub struct BikeAtStation {
    pub station_id: StationId,
    pub station_name: String,
    pub bike_id: BikeId,
    pub bike_name: String,
    pub status: BikeStatus,
}

/// An open trip joined to its bike and start station
#[derive(Debug, Clone, Serialize)]
pub struct ActiveTrip {
    pub trip_id: TripId,
    pub user_id: UserId,
    pub bike_id: BikeId,
    pub bike_name: String,
    pub start_station_id: StationId,
    pub start_station_name: String,
    pub start_time: DateTime<Utc>,
}
