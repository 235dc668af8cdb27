//! Vendor-neutral JSON document, accepted by push and served to pull.
//!
//! ```json
//! {
//!   "station": "backyard-01",
//!   "sensors": [
//!     { "remote_id": "t1", "name": "Air temperature", "sensor_type": "Temperature",
//!       "location": "outdoor", "battery_level": 87.0 }
//!   ],
//!   "readings": [
//!     { "sensor": "t1", "value": 21.4, "timestamp": "2024-05-01T12:00:00Z" }
//!   ]
//! }
//! ```

use serde::Deserialize;

use super::{AdapterError, Pusher, ReportedReading, ReportedSensor, StationReport};

#[derive(Debug, Deserialize)]
pub(crate) struct StationDocument {
    station: Option<String>,
    #[serde(default)]
    sensors: Vec<ReportedSensor>,
    #[serde(default)]
    readings: Vec<ReportedReading>,
}

impl StationDocument {
    pub(crate) fn parse(payload: &[u8]) -> Result<Self, AdapterError> {
        serde_json::from_slice(payload).map_err(|e| AdapterError::Payload(e.to_string()))
    }
}

impl From<StationDocument> for StationReport {
    fn from(doc: StationDocument) -> Self {
        Self {
            sensors: doc.sensors,
            readings: doc.readings,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPusher;

impl Pusher for JsonPusher {
    fn name(&self) -> &'static str {
        "json"
    }

    fn parse_station(&self, payload: &[u8]) -> Result<String, AdapterError> {
        StationDocument::parse(payload)?
            .station
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AdapterError::Payload("missing `station` identifier".into()))
    }

    fn parse_sensors(&self, payload: &[u8]) -> Result<Vec<ReportedSensor>, AdapterError> {
        Ok(StationDocument::parse(payload)?.sensors)
    }

    fn parse_readings(&self, payload: &[u8]) -> Result<Vec<ReportedReading>, AdapterError> {
        Ok(StationDocument::parse(payload)?.readings)
    }
}
