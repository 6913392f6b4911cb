//! User settings
//!
//! Defines all configurable options for a grinding session.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::network::controller::ControllerOptions;
use crate::network::probe::ProbeOptions;
use crate::vision::RelativeRect;

/// Main settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Attempt counting
    pub monitor: MonitorSettings,
    /// Adapter toggling and waiting
    pub network: NetworkSettings,
    /// Connectivity probe
    pub probe: ProbeSettings,
    /// Capture loop
    pub session: SessionSettings,
}

impl Settings {
    /// Read settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse and validate settings from JSON; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the core can't run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "monitor.max_attempts must be at least 1".into(),
            ));
        }
        let positive = |secs: f64| secs.is_finite() && secs > 0.0;
        if !positive(self.network.disable_timeout_secs)
            || !positive(self.network.enable_timeout_secs)
        {
            return Err(ConfigError::Invalid(
                "network timeouts must be positive".into(),
            ));
        }
        if !self.network.progress_log_secs.is_finite() {
            return Err(ConfigError::Invalid(
                "network.progress_log_secs must be finite".into(),
            ));
        }
        if self.network.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "network.poll_interval_ms must be positive".into(),
            ));
        }
        if self.network.stable_checks == 0 {
            return Err(ConfigError::Invalid(
                "network.stable_checks must be at least 1".into(),
            ));
        }
        self.probe.probe_options()?;
        Ok(())
    }

    /// Stop at the first failure
    pub fn quick_check() -> Self {
        Self {
            monitor: MonitorSettings { max_attempts: 1 },
            ..Default::default()
        }
    }

    /// Long unattended grind
    pub fn long_grind() -> Self {
        Self {
            monitor: MonitorSettings { max_attempts: 20 },
            session: SessionSettings {
                frame_interval_ms: 500,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Attempt monitor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Fail transitions before stopping
    pub max_attempts: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

/// Adapter controller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Adapters toggled around a session
    pub adapter_ids: Vec<String>,
    /// Wait timeout when disabling (seconds)
    pub disable_timeout_secs: f64,
    /// Wait timeout when enabling (seconds)
    pub enable_timeout_secs: f64,
    /// Delay between connectivity checks (ms)
    pub poll_interval_ms: u64,
    /// Consecutive matching checks to confirm a state
    pub stable_checks: u32,
    /// Interval between "still waiting" log lines (seconds)
    pub progress_log_secs: f64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            adapter_ids: Vec::new(),
            disable_timeout_secs: 5.0,
            enable_timeout_secs: 10.0,
            poll_interval_ms: 500,
            stable_checks: 2,
            progress_log_secs: 2.0,
        }
    }
}

impl NetworkSettings {
    pub fn disable_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.disable_timeout_secs)
    }

    pub fn enable_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.enable_timeout_secs)
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            stable_checks: self.stable_checks,
            progress_log_interval: Duration::from_secs_f64(self.progress_log_secs.max(0.0)),
            disable_timeout: self.disable_timeout(),
            enable_timeout: self.enable_timeout(),
        }
    }
}

/// Connectivity probe settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Resolvers as `ip:port`
    pub dns_servers: Vec<String>,
    /// Hostname to resolve
    pub dns_query_host: String,
    /// HTTP fallback URL (empty disables it)
    pub http_fallback_url: String,
    /// Budget for one connectivity check (ms)
    pub timeout_ms: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        let defaults = ProbeOptions::default();
        Self {
            dns_servers: defaults.dns_servers.iter().map(ToString::to_string).collect(),
            dns_query_host: defaults.dns_query_host,
            http_fallback_url: defaults.http_fallback_url.unwrap_or_default(),
            timeout_ms: defaults.timeout.as_millis() as u64,
        }
    }
}

impl ProbeSettings {
    pub fn probe_options(&self) -> Result<ProbeOptions, ConfigError> {
        let dns_servers = self
            .dns_servers
            .iter()
            .map(|s| {
                s.parse::<SocketAddr>()
                    .map_err(|_| ConfigError::Invalid(format!("bad DNS server {}", s)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let url = &self.http_fallback_url;

        Ok(ProbeOptions {
            dns_servers,
            dns_query_host: self.dns_query_host.clone(),
            http_fallback_url: (!url.is_empty()).then(|| url.clone()),
            timeout: Duration::from_millis(self.timeout_ms),
        })
    }
}

/// Capture loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Delay between captured frames (ms)
    pub frame_interval_ms: u64,
    /// Hard cap on processed frames
    pub max_frames: Option<u64>,
    /// Disable adapters while grinding
    pub airplane_mode: bool,
    /// Progress bar location within the captured frame
    pub progress_bar_region: Option<RelativeRect>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            frame_interval_ms: 300,
            max_frames: None,
            airplane_mode: true,
            progress_bar_region: None,
        }
    }
}

impl SessionSettings {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}
