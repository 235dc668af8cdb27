use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tokio::time;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{AdapterRegistry, ReportedSensor, StationReport};
use crate::{
    config::PullSource,
    error::{Error, Result},
};

/// Outcome of one ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct IngestSummary {
    /// Distinct sensors inserted or updated.
    pub sensors: usize,
    /// Readings appended.
    pub readings: usize,
    /// Readings dropped because their sensor is unknown to the station.
    pub skipped: usize,
}

/// Writes adapter reports into the store.
#[derive(Debug, Clone)]
pub struct IngestService {
    pool: PgPool,
    registry: AdapterRegistry,
}

impl IngestService {
    pub fn new(pool: PgPool, registry: AdapterRegistry) -> Self {
        Self { pool, registry }
    }

    /// Parses `payload` with the named push adapter and ingests it for the
    /// station the payload identifies.
    pub async fn push(&self, adapter: &str, payload: &[u8]) -> Result<IngestSummary> {
        let pusher = self.registry.pusher(adapter)?;
        let remote_id = pusher.parse_station(payload)?;
        let report = StationReport {
            sensors: pusher.parse_sensors(payload)?,
            readings: pusher.parse_readings(payload)?,
        };

        let station_id: Uuid =
            sqlx::query_scalar("SELECT id FROM stations WHERE remote_id = $1")
                .bind(&remote_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::data_access("find station"))?
                .ok_or_else(|| Error::not_found("station", &remote_id))?;

        self.ingest(station_id, report).await
    }

    /// Fetches one pull source and ingests the result.
    pub async fn pull(&self, source: &PullSource) -> Result<IngestSummary> {
        let puller = self.registry.puller(&source.adapter)?;
        let report = puller.pull(source).await?;
        self.ingest(source.station_id, report).await
    }

    /// Upserts the reported sensors by `(station_id, remote_id)` and appends
    /// the readings, all in one transaction.
    pub async fn ingest(&self, station_id: Uuid, report: StationReport) -> Result<IngestSummary> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(Error::data_access("begin ingest"))?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM stations WHERE id = $1)")
            .bind(station_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(Error::data_access("find station"))?;
        if !exists {
            return Err(Error::not_found("station", station_id));
        }

        let mut upserted = HashSet::new();
        for sensor in &report.sensors {
            upsert_sensor(&mut tx, station_id, sensor).await?;
            upserted.insert(sensor.remote_id.as_str());
        }

        let known = sensor_ids_by_remote_id(&mut tx, station_id).await?;

        let mut sensor_ids: Vec<Uuid> = Vec::with_capacity(report.readings.len());
        let mut values: Vec<f64> = Vec::with_capacity(report.readings.len());
        let mut timestamps: Vec<DateTime<Utc>> = Vec::with_capacity(report.readings.len());
        let mut skipped = 0;
        for reading in &report.readings {
            match known.get(&reading.sensor) {
                Some(id) => {
                    sensor_ids.push(*id);
                    values.push(reading.value);
                    timestamps.push(reading.timestamp);
                }
                None => {
                    warn!(
                        station_id = %station_id,
                        sensor = %reading.sensor,
                        "Skipping reading for unknown sensor"
                    );
                    skipped += 1;
                }
            }
        }

        if !sensor_ids.is_empty() {
            sqlx::query(
                "INSERT INTO readings (sensor_id, value, recorded_at) \
                 SELECT * FROM UNNEST($1::uuid[], $2::float8[], $3::timestamptz[])",
            )
            .bind(&sensor_ids)
            .bind(&values)
            .bind(&timestamps)
            .execute(&mut *tx)
            .await
            .map_err(Error::data_access("append readings"))?;
        }

        tx.commit().await.map_err(Error::data_access("commit ingest"))?;

        let summary = IngestSummary {
            sensors: upserted.len(),
            readings: sensor_ids.len(),
            skipped,
        };
        info!(
            station_id = %station_id,
            sensors = summary.sensors,
            readings = summary.readings,
            skipped = summary.skipped,
            "Station report ingested"
        );
        Ok(summary)
    }

    /// Pulls every source on each tick. Failures are logged and the loop
    /// moves on to the next source. Spawn this via `tokio::spawn`.
    pub async fn run_pull_loop(self, sources: Vec<PullSource>, interval: Duration) {
        info!(
            interval_secs = interval.as_secs(),
            sources = sources.len(),
            "Pull loop started"
        );
        let mut ticker = time::interval(interval);

        loop {
            ticker.tick().await;
            for source in &sources {
                if let Err(e) = self.pull(source).await {
                    error!(
                        station_id = %source.station_id,
                        adapter = %source.adapter,
                        error = %e,
                        "Failed to pull station"
                    );
                }
            }
        }
    }

    /// Rejects sources whose adapter is missing or whose config the adapter
    /// refuses, so misconfiguration surfaces at startup.
    pub fn validate_sources(&self, sources: &[PullSource]) -> Result<()> {
        for source in sources {
            self.registry.puller(&source.adapter)?.validate_config(source)?;
        }
        Ok(())
    }
}

async fn upsert_sensor(
    conn: &mut PgConnection,
    station_id: Uuid,
    sensor: &ReportedSensor,
) -> Result<Uuid> {
    sqlx::query_scalar(
        r#"
        INSERT INTO sensors
            (station_id, remote_id, name, sensor_type, location, battery_level, signal_strength)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (station_id, remote_id) DO UPDATE SET
            name            = EXCLUDED.name,
            sensor_type     = EXCLUDED.sensor_type,
            location        = EXCLUDED.location,
            battery_level   = EXCLUDED.battery_level,
            signal_strength = EXCLUDED.signal_strength,
            updated_at      = now()
        RETURNING id
        "#,
    )
    .bind(station_id)
    .bind(&sensor.remote_id)
    .bind(&sensor.name)
    .bind(sensor.sensor_type.as_str())
    .bind(&sensor.location)
    .bind(sensor.battery_level)
    .bind(sensor.signal_strength)
    .fetch_one(conn)
    .await
    .map_err(Error::data_access("upsert sensor"))
}

async fn sensor_ids_by_remote_id(
    conn: &mut PgConnection,
    station_id: Uuid,
) -> Result<HashMap<String, Uuid>> {
    let rows: Vec<(String, Uuid)> = sqlx::query_as(
        "SELECT remote_id, id FROM sensors WHERE station_id = $1 AND remote_id IS NOT NULL",
    )
    .bind(station_id)
    .fetch_all(conn)
    .await
    .map_err(Error::data_access("load sensors"))?;
    Ok(rows.into_iter().collect())
}
