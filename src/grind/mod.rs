//! Attempt tracking
//!
//! Progress bar states and the monitor that turns a stream of them into a
//! fail count and a stop decision.

pub mod monitor;
pub mod state;

pub use monitor::{AttemptMonitor, HISTORY_WINDOW};
pub use state::{ProgressBarState, StopReason};

/// Attempt monitor errors
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("max_attempts must be greater than 0, got {0}")]
    InvalidMaxAttempts(u32),
}
