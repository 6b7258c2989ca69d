//! Error types for lakehouse-store

use std::fmt;
use thiserror::Error;

/// Storage error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Database errors (PostgreSQL)
    Database,
    /// Serialization/deserialization errors
    Serialization,
    /// Gold snapshot could not be read
    Snapshot,
    /// HTTP transport or non-success status
    Http,
    /// Embedding service returned an unusable answer
    Embedding,
    /// Search index rejected documents
    SearchIndex,
    /// Configuration errors
    Config,
    /// I/O errors
    IO,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Database => "database",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Snapshot => "snapshot",
            ErrorKind::Http => "http",
            ErrorKind::Embedding => "embedding",
            ErrorKind::SearchIndex => "search_index",
            ErrorKind::Config => "config",
            ErrorKind::IO => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Storage error type
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct StorageError {
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub kind: ErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, message)
    }

    pub fn http(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Http, message)
    }

    pub fn embedding(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Embedding, message)
    }

    pub fn search_index(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SearchIndex, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::database(format!("PostgreSQL error: {}", err)).with_source(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::serialization(format!("JSON error: {}", err)).with_source(err)
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::http(format!("HTTP error: {}", err)).with_source(err)
    }
}

impl From<lakehouse_etl::EtlError> for StorageError {
    fn from(err: lakehouse_etl::EtlError) -> Self {
        StorageError::new(ErrorKind::Snapshot, format!("Snapshot error: {}", err)).with_source(err)
    }
}

impl From<lakehouse_etl::ConfigError> for StorageError {
    fn from(err: lakehouse_etl::ConfigError) -> Self {
        StorageError::config(err.to_string()).with_source(err)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StorageError>;
