//! Error types for the Mailgraph core.
//!
//! Uses `thiserror` for public API error types. Only dataset loading and
//! configuration can fail; filter evaluation never does, since an empty
//! visible set is a valid answer.

use std::path::PathBuf;

/// Top-level error type for the Mailgraph core library.
#[derive(Debug, thiserror::Error)]
pub enum MailgraphError {
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from reading and decoding a dataset.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Dataset contains no entities")]
    Empty,
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration load failed: {0}")]
    Load(#[from] Box<figment::Error>),
}

/// A type alias for results using the top-level `MailgraphError`.
pub type Result<T> = std::result::Result<T, MailgraphError>;
