//! Push/pull adapter boundary.
//!
//! Adapters translate vendor payloads into [`StationReport`]s; they never
//! touch the database. [`AdapterRegistry`] is built once at startup and
//! handed to whoever needs it.

pub mod http_pull;
pub mod json;
pub mod service;

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::{config::PullSource, db::models::SensorType};

pub use service::{IngestService, IngestSummary};

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("no {kind} adapter registered as {name:?}")]
    UnknownAdapter { kind: &'static str, name: String },

    #[error("malformed payload: {0}")]
    Payload(String),

    #[error("invalid adapter config: {0}")]
    Config(String),

    #[error("pull request failed: {0}")]
    Fetch(#[from] reqwest::Error),
}

/// A sensor as an adapter reports it, keyed by the vendor's identifier.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReportedSensor {
    pub remote_id: String,
    pub name: String,
    pub sensor_type: SensorType,
    #[serde(default)]
    pub location: String,
    pub battery_level: Option<f64>,
    pub signal_strength: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReportedReading {
    /// `remote_id` of the sensor that took the reading.
    pub sensor: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationReport {
    pub sensors: Vec<ReportedSensor>,
    pub readings: Vec<ReportedReading>,
}

/// A station that sends its data to us.
pub trait Pusher: Send + Sync {
    fn name(&self) -> &'static str;

    /// The station's remote identifier carried in the payload.
    fn parse_station(&self, payload: &[u8]) -> Result<String, AdapterError>;

    fn parse_sensors(&self, payload: &[u8]) -> Result<Vec<ReportedSensor>, AdapterError>;

    fn parse_readings(&self, payload: &[u8]) -> Result<Vec<ReportedReading>, AdapterError>;
}

/// A station whose data we fetch.
#[async_trait]
pub trait Puller: Send + Sync {
    fn name(&self) -> &'static str;

    fn validate_config(&self, source: &PullSource) -> Result<(), AdapterError>;

    async fn pull(&self, source: &PullSource) -> Result<StationReport, AdapterError>;
}

#[derive(Clone, Default)]
pub struct AdapterRegistry {
    pushers: HashMap<&'static str, Arc<dyn Pusher>>,
    pullers: HashMap<&'static str, Arc<dyn Puller>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every adapter shipped in this crate.
    pub fn with_builtin() -> Self {
        Self::new()
            .with_pusher(json::JsonPusher)
            .with_puller(http_pull::HttpJsonPuller::new())
    }

    pub fn with_pusher(mut self, pusher: impl Pusher + 'static) -> Self {
        self.pushers.insert(pusher.name(), Arc::new(pusher));
        self
    }

    pub fn with_puller(mut self, puller: impl Puller + 'static) -> Self {
        self.pullers.insert(puller.name(), Arc::new(puller));
        self
    }

    pub fn pusher(&self, name: &str) -> Result<Arc<dyn Pusher>, AdapterError> {
        self.pushers
            .get(name)
            .cloned()
            .ok_or_else(|| AdapterError::UnknownAdapter {
                kind: "push",
                name: name.to_owned(),
            })
    }

    pub fn puller(&self, name: &str) -> Result<Arc<dyn Puller>, AdapterError> {
        self.pullers
            .get(name)
            .cloned()
            .ok_or_else(|| AdapterError::UnknownAdapter {
                kind: "pull",
                name: name.to_owned(),
            })
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("pushers", &self.pushers.keys().collect::<Vec<_>>())
            .field("pullers", &self.pullers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_resolves_adapters_by_name() {
        let registry = AdapterRegistry::with_builtin();
        assert_eq!(registry.pusher("json").unwrap().name(), "json");
        assert_eq!(registry.puller("http_json").unwrap().name(), "http_json");
    }

    #[test]
    fn unknown_adapter_is_an_error() {
        let registry = AdapterRegistry::with_builtin();
        let err = registry.pusher("ecowitt").err().unwrap();
        assert!(matches!(err, AdapterError::UnknownAdapter { kind: "push", .. }));
        assert!(AdapterRegistry::new().puller("http_json").is_err());
    }
}
