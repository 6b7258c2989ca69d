//! Error types for lakehouse-etl
//!
//! Missing inputs are not errors in this crate: readers return `None` or an
//! empty frame. Errors are reserved for I/O on the output side, snapshot
//! encoding, and configuration.

use thiserror::Error;

use crate::config::ConfigError;

/// Main error type for lakehouse-etl operations
#[derive(Debug, Error)]
pub enum EtlError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow encoding/decoding error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Snapshot contents are not what the reader expected
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Gold dependency graph is not a DAG or references unknown targets
    #[error("Dependency graph error: {0}")]
    Graph(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl EtlError {
    pub fn snapshot(msg: impl Into<String>) -> Self {
        EtlError::Snapshot(msg.into())
    }

    pub fn graph(msg: impl Into<String>) -> Self {
        EtlError::Graph(msg.into())
    }
}

/// Result type alias for lakehouse-etl operations
pub type Result<T> = std::result::Result<T, EtlError>;
