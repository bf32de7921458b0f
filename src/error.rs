//! Error types for review-pulse

use thiserror::Error;
use uuid::Uuid;

use crate::approval::ApprovalError;

/// Main error type for the review-pulse library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV export error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Config file parse error
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// Channel payload could not be normalized
    #[error("cannot normalize {source_name} payload: {message}")]
    Normalize { source_name: String, message: String },

    /// Review not found
    #[error("review not found: {0}")]
    ReviewNotFound(Uuid),

    /// Approval rule rejected the change
    #[error(transparent)]
    Approval(#[from] ApprovalError),
}

/// Result type alias for review-pulse
pub type Result<T> = std::result::Result<T, Error>;
