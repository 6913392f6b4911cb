//! Progress bar states and stop reasons
//!
//! The labels the classifier produces and the terminal conditions the
//! attempt monitor derives from them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Visual condition of the on-screen progress bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProgressBarState {
    /// Red bar: the attempt failed
    Fail,
    /// Bar is filling
    Progress,
    /// Dark, idle bar between attempts
    Standby,
    /// Blue-dominant dialog: the game lost its connection
    ConnectionError,
    /// Nothing recognisable
    Unknown,
}

impl ProgressBarState {
    /// Short lowercase label used in logs and CLI output
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressBarState::Fail => "fail",
            ProgressBarState::Progress => "progress",
            ProgressBarState::Standby => "standby",
            ProgressBarState::ConnectionError => "connection_error",
            ProgressBarState::Unknown => "unknown",
        }
    }

    /// Check if this state ends an attempt
    pub fn is_fail(&self) -> bool {
        matches!(self, ProgressBarState::Fail)
    }
}

impl fmt::Display for ProgressBarState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a monitoring session should end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopReason {
    /// Fail count reached the configured cap
    MaxAttemptsReached,
    /// Bar settled in standby: the upgrade went through
    Success,
    /// Game kept showing the connection error dialog
    ConnectionError,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::MaxAttemptsReached => "max_attempts_reached",
            StopReason::Success => "success",
            StopReason::ConnectionError => "connection_error",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
