//! Error types for eegstream-store.

use std::path::PathBuf;

/// Result type for eegstream-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in eegstream-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to read the schema bootstrap script.
    #[error("Failed to read schema script {path}: {source}")]
    SchemaScript {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A stored timestamp could not be parsed or formatted.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A stored channel identifier failed validation.
    #[error("Invalid channel in row {id}: {source}")]
    InvalidChannel {
        id: i64,
        source: eegstream_types::ChannelError,
    },

    /// A sample value was NaN or infinite.
    #[error("Sample value for channel {channel} is not finite: {value}")]
    NonFiniteValue { channel: String, value: f64 },
}
