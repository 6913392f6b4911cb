//! Configuration module
//!
//! Handles session settings loaded from JSON.

pub mod settings;

pub use settings::Settings;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid settings: {0}")]
    Invalid(String),
}
