use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

use super::{json::StationDocument, AdapterError, Puller, StationReport};
use crate::config::PullSource;

/// Fetches the JSON station document (see [`super::json`]) from a URL.
#[derive(Debug, Clone, Default)]
pub struct HttpJsonPuller {
    http: Client,
}

impl HttpJsonPuller {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Puller for HttpJsonPuller {
    fn name(&self) -> &'static str {
        "http_json"
    }

    fn validate_config(&self, source: &PullSource) -> Result<(), AdapterError> {
        let url = Url::parse(&source.url)
            .map_err(|e| AdapterError::Config(format!("invalid url {:?}: {e}", source.url)))?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(AdapterError::Config(format!(
                "unsupported url scheme {other:?}; expected http or https"
            ))),
        }
    }

    async fn pull(&self, source: &PullSource) -> Result<StationReport, AdapterError> {
        self.validate_config(source)?;
        debug!(station_id = %source.station_id, url = %source.url, "Pulling station document");

        let bytes = self
            .http
            .get(&source.url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        Ok(StationDocument::parse(&bytes)?.into())
    }
}
