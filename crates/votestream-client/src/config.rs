//! Engine configuration.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ClientError;
use crate::policy::{BackoffConfig, ExponentialBackoff, NoReconnect, ReconnectPolicy};

/// Reconnect behaviour after an unexpected disconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Off by default: a lost stream stays `Disconnected` until the caller reconnects.
    #[serde(default)]
    pub enabled: bool,
    /// Maximum consecutive attempts; 0 = keep trying forever
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_initial_backoff_ms() -> u64 { 500 }
fn default_max_backoff_ms() -> u64 { 30_000 }
fn default_multiplier() -> f64 { 2.0 }

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_retries: 0,
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl ReconnectConfig {
    /// Build the policy this config describes.
    pub fn policy(&self) -> Arc<dyn ReconnectPolicy> {
        if !self.enabled {
            return Arc::new(NoReconnect);
        }
        Arc::new(ExponentialBackoff::new(BackoffConfig {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            multiplier: self.multiplier,
        }))
    }
}

/// Endpoints of the REST calls that supply options, roster and fallback votes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    pub options_url: String,
    pub units_url: String,
    /// Already-cast votes, used until the stream delivers `initial_data`
    #[serde(default)]
    pub votes_url: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 { 10_000 }

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Event-stream endpoint, e.g. "https://api.example.com/votings/10/stream"
    pub stream_url: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Treat the stream as dead after this long without bytes (heartbeats count).
    /// Unset = rely on the transport alone.
    #[serde(default)]
    pub idle_timeout_ms: Option<u64>,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// Unset = no options/roster lookups; views start empty.
    #[serde(default)]
    pub directory: Option<DirectoryConfig>,
}

fn default_connect_timeout_ms() -> u64 { 10_000 }

impl EngineConfig {
    /// Config for a bare stream with every other setting at its default.
    pub fn single_stream(stream_url: impl Into<String>) -> Self {
        Self {
            stream_url: stream_url.into(),
            connect_timeout_ms: default_connect_timeout_ms(),
            idle_timeout_ms: None,
            reconnect: ReconnectConfig::default(),
            directory: None,
        }
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, ClientError> {
        let config: Self = serde_yaml::from_str(s).map_err(|e| ClientError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ClientError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let config: Self = load_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every URL parses and the backoff settings make sense.
    pub fn validate(&self) -> Result<(), ClientError> {
        check_url(&self.stream_url)?;
        if let Some(dir) = &self.directory {
            check_url(&dir.options_url)?;
            check_url(&dir.units_url)?;
            if let Some(votes) = &dir.votes_url {
                check_url(votes)?;
            }
        }
        if self.reconnect.enabled && self.reconnect.multiplier < 1.0 {
            return Err(ClientError::Config(format!(
                "reconnect.multiplier must be >= 1.0, got {}",
                self.reconnect.multiplier
            )));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }
}

/// Deserialize any config type from a file: `.json` as JSON, anything else as YAML.
pub fn load_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ClientError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        Ok(serde_json::from_str(&raw)?)
    } else {
        serde_yaml::from_str(&raw)
            .map_err(|e| ClientError::Config(format!("{}: {e}", path.display())))
    }
}

fn check_url(url: &str) -> Result<(), ClientError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| ClientError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ClientError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}
