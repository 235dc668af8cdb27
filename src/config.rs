use std::{num::NonZeroU64, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// PullSource
// ---------------------------------------------------------------------------

/// One station whose readings are fetched periodically by a pull adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullSource {
    pub station_id: Uuid,
    /// Name of the registered `Puller` that understands this source.
    pub adapter: String,
    pub url: String,
}

impl FromStr for PullSource {
    type Err = anyhow::Error;

    /// Parses `station_uuid:adapter:url`. The URL keeps any further colons.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().splitn(3, ':');
        let (Some(station), Some(adapter), Some(url)) = (parts.next(), parts.next(), parts.next())
        else {
            anyhow::bail!("pull source must be 'station_id:adapter:url', got: {s:?}");
        };
        let station_id = station
            .parse::<Uuid>()
            .with_context(|| format!("invalid station id in pull source {s:?}"))?;
        if adapter.is_empty() || url.is_empty() {
            anyhow::bail!("pull source must be 'station_id:adapter:url', got: {s:?}");
        }
        Ok(Self {
            station_id,
            adapter: adapter.to_owned(),
            url: url.to_owned(),
        })
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub db_max_connections: u32,
    /// Deadline applied to every query request (count and data round trips).
    pub query_timeout: Duration,
    /// Pull loop interval.
    pub pull_interval: Duration,
    /// Format: `"uuid:adapter:url,uuid:adapter:url"`.
    pub pull_sources: Vec<PullSource>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            db_max_connections: optional("DB_MAX_CONNECTIONS", "10")
                .parse()
                .context("DB_MAX_CONNECTIONS must be a positive integer")?,
            query_timeout: positive_secs(
                "QUERY_TIMEOUT_SECS",
                &optional("QUERY_TIMEOUT_SECS", "30"),
            )?,
            pull_interval: positive_secs(
                "PULL_INTERVAL_SECS",
                &optional("PULL_INTERVAL_SECS", "300"),
            )?,
            pull_sources: parse_pull_sources(&optional("PULL_SOURCES", ""))?,
        })
    }
}

fn parse_pull_sources(raw: &str) -> Result<Vec<PullSource>> {
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Whole seconds, strictly positive.
fn positive_secs(key: &str, raw: &str) -> Result<Duration> {
    let secs: NonZeroU64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a positive integer, got: {raw:?}"))?;
    Ok(Duration::from_secs(secs.get()))
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_secs_parses_seconds() {
        assert_eq!(
            positive_secs("QUERY_TIMEOUT_SECS", "30").unwrap(),
            Duration::from_secs(30)
        );
        assert_eq!(
            positive_secs("PULL_INTERVAL_SECS", " 300 ").unwrap(),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn positive_secs_rejects_zero() {
        for key in ["QUERY_TIMEOUT_SECS", "PULL_INTERVAL_SECS"] {
            let err = positive_secs(key, "0").unwrap_err();
            assert!(err.to_string().contains(key));
            assert!(err.to_string().contains("positive integer"));
        }
    }

    #[test]
    fn positive_secs_rejects_negative_and_garbage() {
        assert!(positive_secs("PULL_INTERVAL_SECS", "-5").is_err());
        assert!(positive_secs("PULL_INTERVAL_SECS", "five").is_err());
    }

    #[test]
    fn parse_pull_sources_empty() {
        assert!(parse_pull_sources("").unwrap().is_empty());
    }

    #[test]
    fn parse_pull_sources_keeps_url_colons() {
        let id = Uuid::new_v4();
        let raw = format!("{id}:http_json:http://example.com:8080/station.json");
        let sources = parse_pull_sources(&raw).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].station_id, id);
        assert_eq!(sources[0].adapter, "http_json");
        assert_eq!(sources[0].url, "http://example.com:8080/station.json");
    }

    #[test]
    fn parse_pull_sources_multiple_entries() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let raw = format!("{a}:http_json:https://a.test/x, {b}:http_json:https://b.test/y");
        let sources = parse_pull_sources(&raw).unwrap();
        assert_eq!(sources[1].station_id, b);
        assert_eq!(sources[1].url, "https://b.test/y");
    }

    #[test]
    fn parse_pull_sources_bad_uuid_errors() {
        let err = parse_pull_sources("not-a-uuid:http_json:https://a.test").unwrap_err();
        assert!(err.to_string().contains("invalid station id"));
    }

    #[test]
    fn parse_pull_sources_missing_url_errors() {
        let err = parse_pull_sources(&format!("{}:http_json", Uuid::new_v4())).unwrap_err();
        assert!(err.to_string().contains("station_id:adapter:url"));
    }
}
