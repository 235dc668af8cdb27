use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Kinds of measurement a weather-station sensor can report.
///
/// Stored as `TEXT` in `sensors.sensor_type` using the variant name
/// (`"WindSpeed"`, `"Temperature"`, ...), which is also the serde and query
/// string representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum SensorType {
    Temperature,
    Humidity,
    Pressure,
    WindSpeed,
    WindGust,
    WindDirection,
    Rainfall,
    RainRate,
    SolarRadiation,
    UvIndex,
    DewPoint,
    Co2,
    Pm25,
}

impl SensorType {
    pub const ALL: [SensorType; 13] = [
        SensorType::Temperature,
        SensorType::Humidity,
        SensorType::Pressure,
        SensorType::WindSpeed,
        SensorType::WindGust,
        SensorType::WindDirection,
        SensorType::Rainfall,
        SensorType::RainRate,
        SensorType::SolarRadiation,
        SensorType::UvIndex,
        SensorType::DewPoint,
        SensorType::Co2,
        SensorType::Pm25,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SensorType::Temperature => "Temperature",
            SensorType::Humidity => "Humidity",
            SensorType::Pressure => "Pressure",
            SensorType::WindSpeed => "WindSpeed",
            SensorType::WindGust => "WindGust",
            SensorType::WindDirection => "WindDirection",
            SensorType::Rainfall => "Rainfall",
            SensorType::RainRate => "RainRate",
            SensorType::SolarRadiation => "SolarRadiation",
            SensorType::UvIndex => "UvIndex",
            SensorType::DewPoint => "DewPoint",
            SensorType::Co2 => "Co2",
            SensorType::Pm25 => "Pm25",
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SensorType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown sensor type: {s:?}"))
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Sensor {
    pub id: Uuid,
    pub station_id: Uuid,
    pub name: String,
    /// One of the `SensorType` names.
    pub sensor_type: String,
    pub location: String,
    pub enabled: bool,
    pub battery_level: Option<f64>,
    pub signal_strength: Option<f64>,
    /// Identifier used by the vendor payloads to refer to this sensor.
    pub remote_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A reading joined with the sensor metadata the filters operate on.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct ReadingRecord {
    pub id: Uuid,
    pub sensor_id: Uuid,
    pub station_id: Uuid,
    pub sensor_type: String,
    pub location: String,
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}

/// One row of an aggregated response: a `(bucket, group key)` pair.
///
/// Only the column matching the requested grouping dimension is populated,
/// except for sensor grouping where the sensor's type and location are
/// reported alongside its id.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct AggregatedBucket {
    /// Start of the interval the bucket represents.
    pub bucket: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Result of the requested aggregate function.
    pub value: f64,
    pub count: i64,
    pub min: f64,
    pub max: f64,
}
