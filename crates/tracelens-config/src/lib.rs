//! Client configuration for tracelens.
//!
//! [`ClientConfig`] is loaded from the environment (after `.env`) or from a
//! JSON file. The REST base URL is never hardcoded in callers; WebSocket
//! URLs are derived from it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use tracelens_core::Channel;
pub use tracelens_core::DataMode;

pub const ENV_API_BASE: &str = "TRACELENS_API_BASE";
pub const ENV_MODE: &str = "TRACELENS_MODE";
pub const ENV_RECONNECT: &str = "TRACELENS_RECONNECT";
pub const ENV_SESSION_DB: &str = "TRACELENS_SESSION_DB";

const DEFAULT_API_BASE: &str = "http://localhost:8000";

// ─────────────────────────────────────────────────────────────────────────────
// Error
// ─────────────────────────────────────────────────────────────────────────────

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// Page sizes requested by the views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchLimits {
    pub traces: u32,
    pub sessions: u32,
    pub alerts: u32,
    /// Traces held by the tracking view before client-side filtering.
    pub tracking_traces: u32,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self { traces: 50, sessions: 50, alerts: 100, tracking_traces: 100 }
    }
}

/// Opt-in capped exponential backoff for dropped channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { enabled: false, initial_delay_ms: 1_000, max_delay_ms: 10_000, max_attempts: 5 }
    }
}

impl ReconnectPolicy {
    pub fn enabled() -> Self {
        Self { enabled: true, ..Self::default() }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Doubles `current`, capped at the configured maximum.
    pub fn next_backoff(&self, current: Duration) -> Duration {
        let next = current + current;
        let cap = Duration::from_millis(self.max_delay_ms);
        if next > cap {
            cap
        } else {
            next
        }
    }

    /// Whether another attempt is allowed after `attempts` failures.
    pub fn allows(&self, attempts: u32) -> bool {
        self.enabled && attempts < self.max_attempts
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client config
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base: String,
    pub mode: DataMode,
    pub limits: FetchLimits,
    /// Window for the sessions summary.
    pub summary_hours: u32,
    /// Default window for time series.
    pub timeseries_hours: u32,
    pub reconnect: ReconnectPolicy,
    /// SQLite file holding the persisted login. `None` keeps it in memory.
    pub session_db: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            mode: DataMode::Mock,
            limits: FetchLimits::default(),
            summary_hours: 24,
            timeseries_hours: 24,
            reconnect: ReconnectPolicy::default(),
            session_db: None,
        }
    }
}

impl ClientConfig {
    /// Reads `TRACELENS_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(base) = lookup(ENV_API_BASE) {
            config.api_base = base;
        }
        if let Some(mode) = lookup(ENV_MODE) {
            config.mode = mode
                .parse()
                .map_err(|e: tracelens_core::ClientError| ConfigError::Invalid { key: ENV_MODE, reason: e.to_string() })?;
        }
        if let Some(flag) = lookup(ENV_RECONNECT) {
            config.reconnect.enabled = parse_flag(ENV_RECONNECT, &flag)?;
        }
        if let Some(path) = lookup(ENV_SESSION_DB) {
            config.session_db = Some(PathBuf::from(path));
        }

        config.validate()?;
        debug!(api_base = %config.api_base, mode = %config.mode, "Loaded config from environment");
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = Url::parse(&self.api_base).map_err(|e| ConfigError::Invalid {
            key: ENV_API_BASE,
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                key: ENV_API_BASE,
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }
        if self.reconnect.initial_delay_ms == 0 || self.reconnect.max_delay_ms < self.reconnect.initial_delay_ms {
            return Err(ConfigError::Invalid {
                key: ENV_RECONNECT,
                reason: "backoff delays must be positive and ordered".into(),
            });
        }
        Ok(())
    }

    /// Absolute REST URL for `path`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base.trim_end_matches('/'), path)
    }

    /// WebSocket URL for `channel`, with `http` mapped to `ws` and `https`
    /// to `wss`.
    pub fn ws_url(&self, channel: Channel) -> Result<Url, ConfigError> {
        let rest = self.endpoint(channel.path());
        let ws = match rest.split_once("://") {
            Some(("https", tail)) => format!("wss://{tail}"),
            Some(("http", tail)) => format!("ws://{tail}"),
            _ => rest,
        };
        Url::parse(&ws).map_err(|e| ConfigError::Invalid { key: ENV_API_BASE, reason: e.to_string() })
    }
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid { key, reason: format!("expected a boolean, got {other}") }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.mode, DataMode::Mock);
        assert_eq!(config.limits.alerts, 100);
        assert_eq!(config.summary_hours, 24);
        assert!(!config.reconnect.enabled);
    }

    #[test]
    fn test_env_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_API_BASE, "https://obs.example.com/api/"),
            (ENV_MODE, "live"),
            (ENV_RECONNECT, "on"),
            (ENV_SESSION_DB, "/tmp/tracelens.db"),
        ]))
        .unwrap();
        assert_eq!(config.mode, DataMode::Live);
        assert!(config.reconnect.enabled);
        assert_eq!(config.endpoint("/alerts"), "https://obs.example.com/api/alerts");
        assert_eq!(config.session_db, Some(PathBuf::from("/tmp/tracelens.db")));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(ClientConfig::from_lookup(lookup(&[(ENV_API_BASE, "not a url")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[(ENV_API_BASE, "ftp://host")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[(ENV_MODE, "staging")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[(ENV_RECONNECT, "maybe")])).is_err());
    }

    #[test]
    fn test_ws_url_follows_scheme() {
        let mut config = ClientConfig::default();
        assert_eq!(config.ws_url(Channel::Metrics).unwrap().as_str(), "ws://localhost:8000/metrics/ws");

        config.api_base = "https://obs.example.com".into();
        assert_eq!(config.ws_url(Channel::Alerts).unwrap().as_str(), "wss://obs.example.com/alerts/ws");
    }

    #[test]
    fn test_backoff_doubles_to_cap() {
        let policy = ReconnectPolicy::enabled();
        let mut delay = policy.initial_delay();
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(delay.as_secs());
            delay = policy.next_backoff(delay);
        }
        assert_eq!(seen, vec![1, 2, 4, 8, 10, 10]);
        assert!(policy.allows(4));
        assert!(!policy.allows(5));
        assert!(!ReconnectPolicy::default().allows(0));
    }

    #[test]
    fn test_load_from_json_fills_defaults() {
        let config: ClientConfig = serde_json::from_str(r#"{"mode": "live", "limits": {"traces": 20}}"#).unwrap();
        assert_eq!(config.mode, DataMode::Live);
        assert_eq!(config.limits.traces, 20);
        assert_eq!(config.limits.sessions, 50);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
    }
}
