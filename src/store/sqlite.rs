//! SQLite-based storage implementation

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{
    ActiveTrip, Bike, BikeAtStation, BikeId, BikeStatus, Complaint, ComplaintId, FleetStore,
    Station, StationId, StationTripCount, StoreResult, SubscriptionCount, SubscriptionId, Trip,
    TripEngine, TripId, User, UserId,
};
use crate::error::FleetError;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// SQLite-based store implementing both FleetStore and TripEngine.
///
/// A single connection behind a mutex gives single-writer semantics; every
/// multi-row lifecycle operation runs inside one transaction on it.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path
    pub fn open(path: &str) -> Result<Self, FleetError> {
        let conn = Connection::open(path).map_err(FleetError::storage)?;
        Self::init(conn)
    }

    /// Open a private in-memory database (tests, demos)
    pub fn open_in_memory() -> Result<Self, FleetError> {
        let conn = Connection::open_in_memory().map_err(FleetError::storage)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, FleetError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(FleetError::storage)?;

        Self::migrate(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run database migrations
    fn migrate(conn: &Connection) -> Result<(), FleetError> {
        let current_version = Self::get_schema_version(conn)?;

        if current_version < SCHEMA_VERSION {
            tracing::info!(
                current = current_version,
                target = SCHEMA_VERSION,
                "Running database migrations"
            );

            if current_version < 1 {
                Self::migrate_v1(conn)?;
            }

            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )
            .map_err(FleetError::storage)?;

            tracing::info!("Database migrations complete");
        }

        Ok(())
    }

    /// Get current schema version (0 if no schema exists)
    fn get_schema_version(conn: &Connection) -> Result<i32, FleetError> {
        let table_exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
                [],
                |row| row.get(0),
            )
            .map_err(FleetError::storage)?;

        if !table_exists {
            return Ok(0);
        }

        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0).map(|v| v.unwrap_or(0))
        })
        .map_err(FleetError::storage)
    }

    /// Migration to version 1: initial schema
    fn migrate_v1(conn: &Connection) -> Result<(), FleetError> {
        conn.execute_batch(
            r#"
            -- Schema version tracking
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            -- Riders
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                phone TEXT NOT NULL,
                email TEXT,
                latitude REAL,
                longitude REAL
            );

            -- Docking stations (loaded at setup)
            CREATE TABLE IF NOT EXISTS stations (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                max_parking INTEGER NOT NULL,
                available_parking INTEGER NOT NULL
            );

            -- Bikes
            CREATE TABLE IF NOT EXISTS bikes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                current_status TEXT NOT NULL,
                last_station INTEGER REFERENCES stations(id)
            );
            CREATE INDEX IF NOT EXISTS idx_bikes_last_station ON bikes(last_station);

            -- Subscriptions
            CREATE TABLE IF NOT EXISTS subscriptions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                kind TEXT NOT NULL,
                start_time TEXT NOT NULL
            );

            -- Trips (open while end_time IS NULL)
            CREATE TABLE IF NOT EXISTS trips (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                bike_id INTEGER NOT NULL REFERENCES bikes(id),
                start_station_id INTEGER NOT NULL REFERENCES stations(id),
                end_station_id INTEGER REFERENCES stations(id),
                start_time TEXT NOT NULL,
                end_time TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_trips_open_bike ON trips(bike_id) WHERE end_time IS NULL;
            CREATE INDEX IF NOT EXISTS idx_trips_open_user ON trips(user_id) WHERE end_time IS NULL;

            -- Issue reports
            CREATE TABLE IF NOT EXISTS complaints (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bike_id INTEGER NOT NULL REFERENCES bikes(id),
                user_id INTEGER REFERENCES users(id),
                complaint_type TEXT NOT NULL,
                notes TEXT
            );

            -- Maintenance stub, unused by the core workflows
            CREATE TABLE IF NOT EXISTS reparations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bike_id INTEGER NOT NULL REFERENCES bikes(id),
                complaint_id INTEGER NOT NULL REFERENCES complaints(id),
                status TEXT NOT NULL
            );
            "#,
        )
        .map_err(FleetError::storage)?;

        Ok(())
    }
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        name: row.get(1)?,
        phone: row.get(2)?,
        email: row.get(3)?,
        latitude: row.get(4)?,
        longitude: row.get(5)?,
    })
}

fn bike_from_row(row: &Row<'_>) -> rusqlite::Result<Bike> {
    let status: String = row.get(2)?;
    Ok(Bike {
        id: BikeId(row.get(0)?),
        name: row.get(1)?,
        status: BikeStatus::from_str(&status).unwrap_or(BikeStatus::Missing),
        last_station: row.get::<_, Option<i64>>(3)?.map(StationId),
    })
}

fn station_from_row(row: &Row<'_>) -> rusqlite::Result<Station> {
    Ok(Station {
        id: StationId(row.get(0)?),
        name: row.get(1)?,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        max_parking: row.get(4)?,
        available_parking: row.get(5)?,
    })
}

impl FleetStore for SqliteStore {
    fn add_user(
        &self,
        name: &str,
        phone: &str,
        email: Option<&str>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> StoreResult<UserId> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO users (name, phone, email, latitude, longitude)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![name, phone, email, latitude, longitude],
        )
        .map_err(FleetError::storage)?;

        Ok(UserId(conn.last_insert_rowid()))
    }

    fn get_user(&self, user_id: UserId) -> StoreResult<Option<User>> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            "SELECT id, name, phone, email, latitude, longitude FROM users WHERE id = ?1",
            params![user_id.0],
            user_from_row,
        )
        .optional()
        .map_err(FleetError::storage)
    }

    fn add_station(&self, station: &Station) -> StoreResult<StationId> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO stations (id, name, latitude, longitude, max_parking, available_parking)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                station.id.0,
                station.name,
                station.latitude,
                station.longitude,
                station.max_parking,
                station.available_parking,
            ],
        )
        .map_err(FleetError::storage)?;

        Ok(station.id)
    }

    fn get_station(&self, station_id: StationId) -> StoreResult<Option<Station>> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            "SELECT id, name, latitude, longitude, max_parking, available_parking
             FROM stations WHERE id = ?1",
            params![station_id.0],
            station_from_row,
        )
        .optional()
        .map_err(FleetError::storage)
    }

    fn add_bike(
        &self,
        name: &str,
        status: BikeStatus,
        last_station: Option<StationId>,
    ) -> StoreResult<BikeId> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO bikes (name, current_status, last_station) VALUES (?1, ?2, ?3)",
            params![name, status.as_str(), last_station.map(|s| s.0)],
        )
        .map_err(FleetError::storage)?;

        Ok(BikeId(conn.last_insert_rowid()))
    }

    fn get_bike(&self, bike_id: BikeId) -> StoreResult<Option<Bike>> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            "SELECT id, name, current_status, last_station FROM bikes WHERE id = ?1",
            params![bike_id.0],
            bike_from_row,
        )
        .optional()
        .map_err(FleetError::storage)
    }

    fn add_subscription(
        &self,
        user_id: UserId,
        kind: &str,
        start_time: DateTime<Utc>,
    ) -> StoreResult<SubscriptionId> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO subscriptions (user_id, kind, start_time) VALUES (?1, ?2, ?3)",
            params![user_id.0, kind, start_time.to_rfc3339()],
        )
        .map_err(FleetError::storage)?;

        Ok(SubscriptionId(conn.last_insert_rowid()))
    }

    fn get_trip(&self, trip_id: TripId) -> StoreResult<Option<Trip>> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            "SELECT id, user_id, bike_id, start_station_id, end_station_id, start_time, end_time
             FROM trips WHERE id = ?1",
            params![trip_id.0],
            |row| {
                let start_time: String = row.get(5)?;
                let end_time: Option<String> = row.get(6)?;
                Ok(Trip {
                    id: TripId(row.get(0)?),
                    user_id: UserId(row.get(1)?),
                    bike_id: BikeId(row.get(2)?),
                    start_station_id: StationId(row.get(3)?),
                    end_station_id: row.get::<_, Option<i64>>(4)?.map(StationId),
                    start_time: parse_ts(&start_time),
                    end_time: end_time.as_deref().map(parse_ts),
                })
            },
        )
        .optional()
        .map_err(FleetError::storage)
    }

    fn complaints_for_bike(&self, bike_id: BikeId) -> StoreResult<Vec<Complaint>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, bike_id, user_id, complaint_type, notes
                 FROM complaints WHERE bike_id = ?1 ORDER BY id",
            )
            .map_err(FleetError::storage)?;

        let complaints = stmt
            .query_map(params![bike_id.0], |row| {
                Ok(Complaint {
                    id: ComplaintId(row.get(0)?),
                    bike_id: BikeId(row.get(1)?),
                    user_id: row.get::<_, Option<i64>>(2)?.map(UserId),
                    complaint_type: row.get(3)?,
                    notes: row.get(4)?,
                })
            })
            .map_err(FleetError::storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(FleetError::storage)?;

        Ok(complaints)
    }

    fn list_users(&self, name_filter: Option<&str>) -> StoreResult<Vec<User>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, name, phone, email, latitude, longitude FROM users
                 WHERE name != '' AND (?1 IS NULL OR name LIKE '%' || ?1 || '%')
                 ORDER BY name ASC",
            )
            .map_err(FleetError::storage)?;

        let users = stmt
            .query_map(params![name_filter], user_from_row)
            .map_err(FleetError::storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(FleetError::storage)?;

        Ok(users)
    }

    fn list_bikes(&self) -> StoreResult<Vec<Bike>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, name, current_status, last_station FROM bikes
                 WHERE name != '' ORDER BY id",
            )
            .map_err(FleetError::storage)?;

        let bikes = stmt
            .query_map([], bike_from_row)
            .map_err(FleetError::storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(FleetError::storage)?;

        Ok(bikes)
    }

    fn list_stations(&self) -> StoreResult<Vec<Station>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, name, latitude, longitude, max_parking, available_parking
                 FROM stations ORDER BY name",
            )
            .map_err(FleetError::storage)?;

        let stations = stmt
            .query_map([], station_from_row)
            .map_err(FleetError::storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(FleetError::storage)?;

        Ok(stations)
    }

    fn subscription_counts(&self) -> StoreResult<Vec<SubscriptionCount>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT kind, COUNT(*) AS purchased FROM subscriptions
                 GROUP BY kind ORDER BY purchased DESC",
            )
            .map_err(FleetError::storage)?;

        let counts = stmt
            .query_map([], |row| {
                Ok(SubscriptionCount {
                    kind: row.get(0)?,
                    purchased: row.get(1)?,
                })
            })
            .map_err(FleetError::storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(FleetError::storage)?;

        Ok(counts)
    }

    fn station_trip_counts(&self) -> StoreResult<Vec<StationTripCount>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT s.id, s.name, COUNT(t.id) AS trips
                 FROM stations s
                 LEFT JOIN trips t ON s.id = t.end_station_id
                 GROUP BY s.id, s.name
                 ORDER BY s.id",
            )
            .map_err(FleetError::storage)?;

        let counts = stmt
            .query_map([], |row| {
                Ok(StationTripCount {
                    station_id: StationId(row.get(0)?),
                    station_name: row.get(1)?,
                    trips: row.get(2)?,
                })
            })
            .map_err(FleetError::storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(FleetError::storage)?;

        Ok(counts)
    }

    fn bikes_at_stations(
        &self,
        station_filter: Option<&str>,
        bike_filter: Option<&str>,
    ) -> StoreResult<Vec<BikeAtStation>> {
        let conn = self.conn.lock().unwrap();

        // Blank filters behave like absent ones
        let station_filter = station_filter.map(str::trim).filter(|f| !f.is_empty());
        let bike_filter = bike_filter.map(str::trim).filter(|f| !f.is_empty());

        let mut stmt = conn
            .prepare(
                "SELECT s.id, s.name, b.id, b.name, b.current_status
                 FROM stations s
                 INNER JOIN bikes b ON s.id = b.last_station
                 WHERE b.current_status = 'Parked'
                   AND (?1 IS NULL OR s.name LIKE '%' || ?1 || '%')
                   AND (?2 IS NULL OR b.name LIKE '%' || ?2 || '%')
                 ORDER BY s.name, b.name",
            )
            .map_err(FleetError::storage)?;

        let rows = stmt
            .query_map(params![station_filter, bike_filter], |row| {
                let status: String = row.get(4)?;
                Ok(BikeAtStation {
                    station_id: StationId(row.get(0)?),
                    station_name: row.get(1)?,
                    bike_id: BikeId(row.get(2)?),
                    bike_name: row.get(3)?,
                    status: BikeStatus::from_str(&status).unwrap_or(BikeStatus::Parked),
                })
            })
            .map_err(FleetError::storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(FleetError::storage)?;

        Ok(rows)
    }

    fn active_trips(&self, user_id: Option<UserId>) -> StoreResult<Vec<ActiveTrip>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT t.id, t.user_id, t.bike_id, b.name, t.start_station_id, s.name, t.start_time
                 FROM trips t
                 JOIN bikes b ON t.bike_id = b.id
                 JOIN stations s ON t.start_station_id = s.id
                 WHERE t.end_time IS NULL
                   AND (?1 IS NULL OR t.user_id = ?1)
                 ORDER BY t.start_time DESC",
            )
            .map_err(FleetError::storage)?;

        let trips = stmt
            .query_map(params![user_id.map(|u| u.0)], |row| {
                let start_time: String = row.get(6)?;
                Ok(ActiveTrip {
                    trip_id: TripId(row.get(0)?),
                    user_id: UserId(row.get(1)?),
                    bike_id: BikeId(row.get(2)?),
                    bike_name: row.get(3)?,
                    start_station_id: StationId(row.get(4)?),
                    start_station_name: row.get(5)?,
                    start_time: parse_ts(&start_time),
                })
            })
            .map_err(FleetError::storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(FleetError::storage)?;

        Ok(trips)
    }
}

impl TripEngine for SqliteStore {
    fn checkout(
        &self,
        user_id: UserId,
        bike_id: BikeId,
        station_id: StationId,
    ) -> StoreResult<TripId> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(FleetError::storage)?;

        // One open trip per user
        let has_open: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM trips WHERE user_id = ?1 AND end_time IS NULL)",
                params![user_id.0],
                |row| row.get(0),
            )
            .map_err(FleetError::storage)?;
        if has_open {
            return Err(FleetError::UserHasActiveTrip);
        }

        let bike: Option<(String, Option<i64>)> = tx
            .query_row(
                "SELECT current_status, last_station FROM bikes WHERE id = ?1",
                params![bike_id.0],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(FleetError::storage)?;

        let (status, last_station) = bike.ok_or(FleetError::BikeNotFound(bike_id))?;
        if status != BikeStatus::Parked.as_str() || last_station != Some(station_id.0) {
            return Err(FleetError::BikeNotAvailable);
        }

        // Guarded flip: re-checks Parked inside the transaction, so a
        // concurrent checkout of the same bike cannot both succeed.
        let flipped = tx
            .execute(
                "UPDATE bikes SET current_status = ?1 WHERE id = ?2 AND current_status = ?3",
                params![
                    BikeStatus::Active.as_str(),
                    bike_id.0,
                    BikeStatus::Parked.as_str()
                ],
            )
            .map_err(FleetError::storage)?;
        if flipped == 0 {
            return Err(FleetError::BikeNotAvailable);
        }

        tx.execute(
            "INSERT INTO trips (user_id, bike_id, start_station_id, start_time)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id.0, bike_id.0, station_id.0, Utc::now().to_rfc3339()],
        )
        .map_err(FleetError::storage)?;

        let trip_id = TripId(tx.last_insert_rowid());
        tx.commit().map_err(FleetError::storage)?;

        tracing::info!(%user_id, %bike_id, %station_id, %trip_id, "Checkout complete");
        Ok(trip_id)
    }

    fn dropoff(
        &self,
        user_id: UserId,
        bike_id: BikeId,
        station_id: StationId,
    ) -> StoreResult<TripId> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(FleetError::storage)?;

        let trip_id: Option<i64> = tx
            .query_row(
                "SELECT id FROM trips
                 WHERE user_id = ?1 AND bike_id = ?2 AND end_time IS NULL
                 ORDER BY start_time DESC LIMIT 1",
                params![user_id.0, bike_id.0],
                |row| row.get(0),
            )
            .optional()
            .map_err(FleetError::storage)?;

        let trip_id = match trip_id {
            Some(id) => TripId(id),
            None => {
                // The bike may be on an open trip under someone else; that
                // deserves a sharper error than "not found".
                let owner: Option<i64> = tx
                    .query_row(
                        "SELECT user_id FROM trips WHERE bike_id = ?1 AND end_time IS NULL",
                        params![bike_id.0],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(FleetError::storage)?;

                return Err(match owner {
                    Some(owner) => FleetError::CheckedOutByOther {
                        owner: UserId(owner),
                    },
                    None => FleetError::NoActiveTrip,
                });
            }
        };

        let station_exists: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM stations WHERE id = ?1)",
                params![station_id.0],
                |row| row.get(0),
            )
            .map_err(FleetError::storage)?;
        if !station_exists {
            return Err(FleetError::StationNotFound(station_id));
        }

        tx.execute(
            "UPDATE trips SET end_station_id = ?1, end_time = ?2 WHERE id = ?3",
            params![station_id.0, Utc::now().to_rfc3339(), trip_id.0],
        )
        .map_err(FleetError::storage)?;

        // The bike row must move in the same transaction; a zero-row update
        // here means the denormalized status would lag the trip record.
        let parked = tx
            .execute(
                "UPDATE bikes SET current_status = ?1, last_station = ?2 WHERE id = ?3",
                params![BikeStatus::Parked.as_str(), station_id.0, bike_id.0],
            )
            .map_err(FleetError::storage)?;
        if parked == 0 {
            return Err(FleetError::BikeNotFound(bike_id));
        }

        tx.commit().map_err(FleetError::storage)?;

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
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(FleetError::storage)?;

        let exists: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM bikes WHERE id = ?1)",
                params![bike_id.0],
                |row| row.get(0),
            )
            .map_err(FleetError::storage)?;
        if !exists {
            return Err(FleetError::BikeNotFound(bike_id));
        }

        for issue in issues {
            tx.execute(
                "INSERT INTO complaints (bike_id, user_id, complaint_type, notes)
                 VALUES (?1, ?2, ?3, ?4)",
                params![bike_id.0, user_id.map(|u| u.0), issue, notes],
            )
            .map_err(FleetError::storage)?;
        }

        if !issues.is_empty() {
            tx.execute(
                "UPDATE bikes SET current_status = ?1 WHERE id = ?2",
                params![BikeStatus::Missing.as_str(), bike_id.0],
            )
            .map_err(FleetError::storage)?;
            tracing::warn!(%bike_id, count = issues.len(), "Bike flagged Missing after issue report");
        }

        tx.commit().map_err(FleetError::storage)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        let store = SqliteStore::open(path.to_str().unwrap()).unwrap();
        (store, dir) // Return dir to keep it alive
    }

    fn seed_station(store: &SqliteStore, id: i64, name: &str) -> StationId {
        store
            .add_station(&Station {
                id: StationId(id),
                name: name.to_string(),
                latitude: 58.97,
                longitude: 5.73,
                max_parking: 10,
                available_parking: 3,
            })
            .unwrap()
    }

    #[test]
    fn test_checkout_flips_bike_and_opens_trip() {
        let (store, _dir) = create_test_store();
        let station = seed_station(&store, 1, "Sentrum");
        let user = store.add_user("Ole Hansen", "12345678", None, None, None).unwrap();
        let bike = store.add_bike("Lynet", BikeStatus::Parked, Some(station)).unwrap();

        let trip_id = store.checkout(user, bike, station).unwrap();

        let bike = store.get_bike(bike).unwrap().unwrap();
        assert_eq!(bike.status, BikeStatus::Active);

        let trip = store.get_trip(trip_id).unwrap().unwrap();
        assert!(trip.is_open());
        assert_eq!(trip.user_id, user);
        assert_eq!(trip.start_station_id, station);
        assert!(trip.end_station_id.is_none());
    }

    #[test]
    fn test_checkout_unknown_bike() {
        let (store, _dir) = create_test_store();
        let station = seed_station(&store, 1, "Sentrum");
        let user = store.add_user("Ole Hansen", "12345678", None, None, None).unwrap();

        let result = store.checkout(user, BikeId(999), station);
        assert!(matches!(result, Err(FleetError::BikeNotFound(BikeId(999)))));
    }

    #[test]
    fn test_checkout_rejects_non_parked_bike() {
        let (store, _dir) = create_test_store();
        let station = seed_station(&store, 1, "Sentrum");
        let user = store.add_user("Ole Hansen", "12345678", None, None, None).unwrap();
        // Status is Missing even though last_station matches
        let bike = store.add_bike("Lynet", BikeStatus::Missing, Some(station)).unwrap();

        let result = store.checkout(user, bike, station);
        assert!(matches!(result, Err(FleetError::BikeNotAvailable)));
    }

    #[test]
    fn test_checkout_rejects_wrong_station() {
        let (store, _dir) = create_test_store();
        let here = seed_station(&store, 1, "Sentrum");
        let there = seed_station(&store, 2, "Havna");
        let user = store.add_user("Ole Hansen", "12345678", None, None, None).unwrap();
        let bike = store.add_bike("Lynet", BikeStatus::Parked, Some(here)).unwrap();

        let result = store.checkout(user, bike, there);
        assert!(matches!(result, Err(FleetError::BikeNotAvailable)));
    }

    #[test]
    fn test_checkout_blocks_second_trip_for_user() {
        let (store, _dir) = create_test_store();
        let station = seed_station(&store, 1, "Sentrum");
        let user = store.add_user("Ole Hansen", "12345678", None, None, None).unwrap();
        let first = store.add_bike("Lynet", BikeStatus::Parked, Some(station)).unwrap();
        let second = store.add_bike("Tordenvær", BikeStatus::Parked, Some(station)).unwrap();

        store.checkout(user, first, station).unwrap();
        let result = store.checkout(user, second, station);
        assert!(matches!(result, Err(FleetError::UserHasActiveTrip)));
    }

    #[test]
    fn test_at_most_one_open_trip_per_bike() {
        let (store, _dir) = create_test_store();
        let station = seed_station(&store, 1, "Sentrum");
        let ole = store.add_user("Ole Hansen", "12345678", None, None, None).unwrap();
        let kari = store.add_user("Kari Olsen", "87654321", None, None, None).unwrap();
        let bike = store.add_bike("Lynet", BikeStatus::Parked, Some(station)).unwrap();

        store.checkout(ole, bike, station).unwrap();

        // Second rider can't take the same bike: it is Active now
        let result = store.checkout(kari, bike, station);
        assert!(matches!(result, Err(FleetError::BikeNotAvailable)));

        let open: Vec<_> = store
            .active_trips(None)
            .unwrap()
            .into_iter()
            .filter(|t| t.bike_id == bike)
            .collect();
        assert_eq!(open.len(), 1);
    }

    #[test]
    fn test_dropoff_closes_trip_and_parks_bike() {
        let (store, _dir) = create_test_store();
        let start = seed_station(&store, 1, "Sentrum");
        let end = seed_station(&store, 2, "Havna");
        let user = store.add_user("Ole Hansen", "12345678", None, None, None).unwrap();
        let bike = store.add_bike("Lynet", BikeStatus::Parked, Some(start)).unwrap();

        let trip_id = store.checkout(user, bike, start).unwrap();
        let closed = store.dropoff(user, bike, end).unwrap();
        assert_eq!(closed, trip_id);

        let trip = store.get_trip(trip_id).unwrap().unwrap();
        assert_eq!(trip.end_station_id, Some(end));
        assert!(trip.end_time.is_some());

        let bike = store.get_bike(bike).unwrap().unwrap();
        assert_eq!(bike.status, BikeStatus::Parked);
        assert_eq!(bike.last_station, Some(end));
    }

    #[test]
    fn test_dropoff_names_actual_owner() {
        let (store, _dir) = create_test_store();
        let station = seed_station(&store, 1, "Sentrum");
        let ole = store.add_user("Ole Hansen", "12345678", None, None, None).unwrap();
        let kari = store.add_user("Kari Olsen", "87654321", None, None, None).unwrap();
        let bike = store.add_bike("Lynet", BikeStatus::Parked, Some(station)).unwrap();

        store.checkout(ole, bike, station).unwrap();

        let result = store.dropoff(kari, bike, station);
        match result {
            Err(FleetError::CheckedOutByOther { owner }) => assert_eq!(owner, ole),
            other => panic!("expected ownership conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_dropoff_without_open_trip() {
        let (store, _dir) = create_test_store();
        let station = seed_station(&store, 1, "Sentrum");
        let user = store.add_user("Ole Hansen", "12345678", None, None, None).unwrap();
        let bike = store.add_bike("Lynet", BikeStatus::Parked, Some(station)).unwrap();

        let result = store.dropoff(user, bike, station);
        assert!(matches!(result, Err(FleetError::NoActiveTrip)));
    }

    #[test]
    fn test_dropoff_at_unknown_station() {
        let (store, _dir) = create_test_store();
        let station = seed_station(&store, 1, "Sentrum");
        let user = store.add_user("Ole Hansen", "12345678", None, None, None).unwrap();
        let bike = store.add_bike("Lynet", BikeStatus::Parked, Some(station)).unwrap();

        let trip_id = store.checkout(user, bike, station).unwrap();

        let result = store.dropoff(user, bike, StationId(42));
        assert!(matches!(result, Err(FleetError::StationNotFound(StationId(42)))));

        // The failed dropoff left nothing half-done
        assert!(store.get_trip(trip_id).unwrap().unwrap().is_open());
        let bike_row = store.get_bike(bike).unwrap().unwrap();
        assert_eq!(bike_row.status, BikeStatus::Active);
    }

    #[test]
    fn test_report_issues_flags_bike_missing() {
        let (store, _dir) = create_test_store();
        let station = seed_station(&store, 1, "Sentrum");
        let user = store.add_user("Ole Hansen", "12345678", None, None, None).unwrap();
        let bike = store.add_bike("Lynet", BikeStatus::Parked, Some(station)).unwrap();

        let issues = vec!["Flat tire".to_string(), "Missing bell".to_string()];
        store
            .report_issues(bike, Some(user), &issues, Some("front wheel wobbles"))
            .unwrap();

        let bike_row = store.get_bike(bike).unwrap().unwrap();
        assert_eq!(bike_row.status, BikeStatus::Missing);

        let complaints = store.complaints_for_bike(bike).unwrap();
        assert_eq!(complaints.len(), 2);
        assert!(complaints.iter().all(|c| c.user_id == Some(user)));
        assert!(complaints
            .iter()
            .all(|c| c.notes.as_deref() == Some("front wheel wobbles")));
    }

    #[test]
    fn test_report_no_issues_is_a_status_noop() {
        let (store, _dir) = create_test_store();
        let station = seed_station(&store, 1, "Sentrum");
        let bike = store.add_bike("Lynet", BikeStatus::Parked, Some(station)).unwrap();

        store.report_issues(bike, None, &[], None).unwrap();

        let bike_row = store.get_bike(bike).unwrap().unwrap();
        assert_eq!(bike_row.status, BikeStatus::Parked);
        assert!(store.complaints_for_bike(bike).unwrap().is_empty());
    }

    #[test]
    fn test_list_users_alphabetical_and_filtered() {
        let (store, _dir) = create_test_store();
        store.add_user("Kari Olsen", "87654321", None, None, None).unwrap();
        store.add_user("Anne Berg", "11111111", None, None, None).unwrap();
        store.add_user("Ole Hansen", "12345678", None, None, None).unwrap();

        let all = store.list_users(None).unwrap();
        let names: Vec<_> = all.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Anne Berg", "Kari Olsen", "Ole Hansen"]);

        // Case-insensitive substring match
        let filtered = store.list_users(Some("hans")).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "Ole Hansen");
    }

    #[test]
    fn test_station_trip_counts_include_zero_count_stations() {
        let (store, _dir) = create_test_store();
        let start = seed_station(&store, 1, "Sentrum");
        let end = seed_station(&store, 2, "Havna");
        let idle = seed_station(&store, 3, "Parken");
        let user = store.add_user("Ole Hansen", "12345678", None, None, None).unwrap();
        let bike = store.add_bike("Lynet", BikeStatus::Parked, Some(start)).unwrap();

        store.checkout(user, bike, start).unwrap();
        store.dropoff(user, bike, end).unwrap();

        let counts = store.station_trip_counts().unwrap();
        assert_eq!(counts.len(), 3);

        let by_id = |id: StationId| counts.iter().find(|c| c.station_id == id).unwrap();
        assert_eq!(by_id(start).trips, 0); // only end stations count
        assert_eq!(by_id(end).trips, 1);
        assert_eq!(by_id(idle).trips, 0);
    }

    #[test]
    fn test_bikes_at_stations_filters_compose() {
        let (store, _dir) = create_test_store();
        let sentrum = seed_station(&store, 1, "Sentrum vest");
        let havna = seed_station(&store, 2, "Havna");
        store.add_bike("Lynet", BikeStatus::Parked, Some(sentrum)).unwrap();
        store.add_bike("Tordenvær", BikeStatus::Parked, Some(sentrum)).unwrap();
        store.add_bike("Stormen", BikeStatus::Parked, Some(havna)).unwrap();
        store.add_bike("Borte", BikeStatus::Active, Some(sentrum)).unwrap();

        // Station filter alone, case-insensitive, bike filter blank
        let rows = store.bikes_at_stations(Some("sent"), Some("")).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.station_id == sentrum));
        assert!(rows.iter().all(|r| r.status == BikeStatus::Parked));

        // Both filters AND-compose
        let rows = store.bikes_at_stations(Some("Sent"), Some("Lyn")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].bike_name, "Lynet");

        // No filters: every Parked bike, ordered by station then bike name
        let rows = store.bikes_at_stations(None, None).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].station_name, "Havna");
    }

    #[test]
    fn test_active_trips_optionally_filtered_by_user() {
        let (store, _dir) = create_test_store();
        let station = seed_station(&store, 1, "Sentrum");
        let ole = store.add_user("Ole Hansen", "12345678", None, None, None).unwrap();
        let kari = store.add_user("Kari Olsen", "87654321", None, None, None).unwrap();
        let first = store.add_bike("Lynet", BikeStatus::Parked, Some(station)).unwrap();
        let second = store.add_bike("Stormen", BikeStatus::Parked, Some(station)).unwrap();

        store.checkout(ole, first, station).unwrap();
        store.checkout(kari, second, station).unwrap();

        assert_eq!(store.active_trips(None).unwrap().len(), 2);

        let mine = store.active_trips(Some(ole)).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].bike_name, "Lynet");
        assert_eq!(mine[0].start_station_name, "Sentrum");
    }

    #[test]
    fn test_subscription_counts_descending() {
        let (store, _dir) = create_test_store();
        let user = store.add_user("Ole Hansen", "12345678", None, None, None).unwrap();
        let now = Utc::now();
        store.add_subscription(user, "Monthly", now).unwrap();
        store.add_subscription(user, "Monthly", now).unwrap();
        store.add_subscription(user, "Annual", now).unwrap();

        let counts = store.subscription_counts().unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].kind, "Monthly");
        assert_eq!(counts[0].purchased, 2);
        assert_eq!(counts[1].purchased, 1);
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let (store, _dir) = create_test_store();

        // Bike pointing at a nonexistent station is rejected
        let result = store.add_bike("Lynet", BikeStatus::Parked, Some(StationId(42)));
        assert!(matches!(result, Err(FleetError::Storage(_))));
    }

    #[test]
    fn test_schema_migration_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        {
            let store = SqliteStore::open(path.to_str().unwrap()).unwrap();
            seed_station(&store, 1, "Sentrum");
        }
        // Reopen: migration must not clobber existing rows
        let store = SqliteStore::open(path.to_str().unwrap()).unwrap();
        assert_eq!(store.list_stations().unwrap().len(), 1);
    }
}
