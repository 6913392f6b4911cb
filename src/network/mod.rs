//! Network adapter control
//!
//! Enables and disables adapters for the airplane-mode trick and waits
//! until connectivity confirms the change.

pub mod clock;
pub mod controller;
pub mod platform;
pub mod probe;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use clock::{Clock, SystemClock};
pub use controller::{ControllerOptions, NetworkAdapterController};
pub use platform::PowerShellPlatform;
pub use probe::ReachabilityProbe;

/// Snapshot of one OS network adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAdapter {
    /// Opaque unique id (interface GUID on Windows)
    pub id: String,
    /// Display name
    pub name: String,
    /// Whether the adapter is currently enabled
    pub enabled: bool,
    /// Media type, if the platform reports one
    pub kind: Option<String>,
}

/// Internet reachability as seen by a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectivityState {
    Online,
    Offline,
}

impl ConnectivityState {
    pub fn from_online(online: bool) -> Self {
        if online {
            ConnectivityState::Online
        } else {
            ConnectivityState::Offline
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, ConnectivityState::Online)
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectivityState::Online => f.write_str("online"),
            ConnectivityState::Offline => f.write_str("offline"),
        }
    }
}

/// OS-level adapter enumeration and toggling
pub trait AdapterPlatform: Send + Sync {
    /// Current adapters, read fresh from the OS
    fn list(&self) -> Result<Vec<NetworkAdapter>, NetworkError>;

    /// Enable or disable one adapter; `Ok(false)` when the OS refused
    fn set_enabled(&self, id: &str, enabled: bool) -> Result<bool, NetworkError>;
}

/// Internet reachability check
///
/// Must answer within a short bounded time.
pub trait ConnectivityProbe: Send + Sync {
    fn check(&self) -> ConnectivityState;
}

/// Network control errors
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("Timed out waiting for network to go {expected} after {:.1}s", .timeout.as_secs_f64())]
    Timeout {
        expected: ConnectivityState,
        timeout: Duration,
    },
    #[error("Adapter platform error: {0}")]
    Platform(String),
    #[error("Failed to run {command}: {source}")]
    Command {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse adapter list: {0}")]
    Parse(#[from] serde_json::Error),
}
