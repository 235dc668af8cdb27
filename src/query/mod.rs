//! Reading Query & Aggregation Engine.
//!
//! `params` validates a request, `filter` renders its WHERE clause,
//! `raw` and `aggregate` run the count-then-fetch pair, and `engine` ties
//! them together under one deadline and one snapshot.

pub mod aggregate;
pub mod engine;
pub mod envelope;
pub mod filter;
pub mod params;
pub mod raw;

pub use engine::ReadingQueryEngine;
pub use envelope::{Paginated, ReadingsResponse};
pub use filter::ReadingFilter;
pub use params::{ReadingRequest, ReadingsParams};

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use chrono::{DateTime, TimeZone, Utc};
    use sqlx::PgPool;
    use tokio::time::Instant;
    use uuid::Uuid;

    use crate::db::models::SensorType;

    /// A truncated hour boundary all fixtures are laid out from.
    pub fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
    }

    pub fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(30)
    }

    pub async fn insert_station(pool: &PgPool, name: &str) -> Uuid {
        sqlx::query_scalar("INSERT INTO stations (name, remote_id) VALUES ($1, $1) RETURNING id")
            .bind(name)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    pub async fn insert_sensor(
        pool: &PgPool,
        station_id: Uuid,
        sensor_type: SensorType,
        location: &str,
    ) -> Uuid {
        sqlx::query_scalar(
            "INSERT INTO sensors (station_id, name, sensor_type, location) \
             VALUES ($1, $2, $2, $3) RETURNING id",
        )
        .bind(station_id)
        .bind(sensor_type.as_str())
        .bind(location)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    pub async fn insert_reading(pool: &PgPool, sensor_id: Uuid, value: f64, at: DateTime<Utc>) {
        sqlx::query("INSERT INTO readings (sensor_id, value, recorded_at) VALUES ($1, $2, $3)")
            .bind(sensor_id)
            .bind(value)
            .bind(at)
            .execute(pool)
            .await
            .unwrap();
    }
}
