//! Error types for the sheds_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for sheds_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Record store failure (missing blob, unreadable store)
    #[error("Store error: {0}")]
    Store(String),

    /// Blend conditions that cannot be planned at all
    #[error("Invalid blend conditions: {0}")]
    InvalidBlend(String),

    /// Selected banks cannot supply the oxygen the blend needs
    #[error("Blend is not feasible: banks are short by {shortfall_litres:.1} litres of O2")]
    InfeasibleBlend { shortfall_litres: f64 },

    /// One or more loan fields failed validation
    #[error("Invalid fields: {}", .0.join(", "))]
    Validation(Vec<String>),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
