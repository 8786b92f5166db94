use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::errors::SniperError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Platform
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Prefix every event page URL starts with; the event id follows it.
    #[serde(default = "default_event_url_prefix")]
    pub event_url_prefix: String,

    // HTTP client
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Requests in flight at once across the whole client. Higher limits may
    /// get the connection flagged by the platform.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Idle keep-alive connections retained in the pool per host.
    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,

    // Poller
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_overall_timeout_ms")]
    pub overall_timeout_ms: u64,

    // Scheduler
    #[serde(default = "default_start_buffer_ms")]
    pub start_buffer_ms: u64,

    // Credential store
    #[serde(default = "default_credential_path")]
    pub credential_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            event_url_prefix: default_event_url_prefix(),
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            max_connections: default_max_connections(),
            max_idle_per_host: default_max_idle_per_host(),
            poll_interval_ms: default_poll_interval_ms(),
            overall_timeout_ms: default_overall_timeout_ms(),
            start_buffer_ms: default_start_buffer_ms(),
            credential_path: default_credential_path(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.kide.app".to_string()
}
fn default_event_url_prefix() -> String {
    "https://kide.app/events/".to_string()
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_max_connections() -> usize {
    10
}
fn default_max_idle_per_host() -> usize {
    10
}

// Poller defaults
fn default_poll_interval_ms() -> u64 {
    50
}
fn default_overall_timeout_ms() -> u64 {
    90_000
}

fn default_start_buffer_ms() -> u64 {
    2_000
}
fn default_credential_path() -> String {
    "user.txt".to_string()
}

impl Config {
    /// Load configuration from "config.toml" if present, otherwise return defaults.
    /// ENV overrides have the highest priority:
    /// - SNIPER_API_BASE_URL
    /// - SNIPER_POLL_INTERVAL_MS
    /// - SNIPER_OVERALL_TIMEOUT_MS
    /// - SNIPER_START_BUFFER_MS
    /// - SNIPER_MAX_CONNECTIONS
    pub fn load() -> Result<Self, SniperError> {
        Self::load_from("config.toml")
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, SniperError> {
        let path = path.as_ref();
        let mut cfg = match fs::read_to_string(path) {
            Ok(s) => toml::from_str::<Config>(&s).map_err(|e| {
                SniperError::config(format!("failed to parse {}: {}", path.display(), e))
            })?,
            Err(_) => Config::default(),
        };

        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SNIPER_API_BASE_URL") {
            if !v.trim().is_empty() {
                self.api_base_url = v.trim().to_string();
            }
        }
        if let Some(v) = env_u64("SNIPER_POLL_INTERVAL_MS") {
            self.poll_interval_ms = v;
        }
        if let Some(v) = env_u64("SNIPER_OVERALL_TIMEOUT_MS") {
            self.overall_timeout_ms = v;
        }
        if let Some(v) = env_u64("SNIPER_START_BUFFER_MS") {
            self.start_buffer_ms = v;
        }
        if let Some(v) = env_u64("SNIPER_MAX_CONNECTIONS") {
            self.max_connections = v as usize;
        }
    }

    /// Validate configuration consistency and constraints
    pub fn validate(&self) -> Result<(), SniperError> {
        if self.api_base_url.trim().is_empty() {
            return Err(SniperError::config("api_base_url must not be empty"));
        }

        if self.event_url_prefix.trim().is_empty() {
            return Err(SniperError::config("event_url_prefix must not be empty"));
        }

        if self.poll_interval_ms == 0 {
            return Err(SniperError::config("poll_interval_ms must be greater than 0"));
        }

        if self.overall_timeout_ms == 0 {
            return Err(SniperError::config("overall_timeout_ms must be greater than 0"));
        }

        if self.poll_interval_ms >= self.overall_timeout_ms {
            return Err(SniperError::config(
                "poll_interval_ms must be smaller than overall_timeout_ms",
            ));
        }

        if self.request_timeout_ms == 0 || self.connect_timeout_ms == 0 {
            return Err(SniperError::config("HTTP timeouts must be greater than 0"));
        }

        if self.max_connections == 0 {
            return Err(SniperError::config("max_connections must be greater than 0"));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_millis(self.overall_timeout_ms)
    }

    pub fn start_buffer(&self) -> Duration {
        Duration::from_millis(self.start_buffer_ms)
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<u64>().ok())
}
