use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("ETL error: {0}")]
    Etl(#[from] lakehouse_etl::EtlError),

    #[error("Storage error: {0}")]
    Storage(#[from] lakehouse_store::StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] lakehouse_etl::ConfigError),

    /// A stage was asked to run partially but has no partial entrypoint
    #[error("{stage} stage has no selective entrypoint; refusing to fall back to a full run")]
    MissingCapability { stage: &'static str },

    #[error("State store error: {0}")]
    State(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrchestratorError {
    pub fn state<E: std::fmt::Display>(e: E) -> Self {
        Self::State(e.to_string())
    }

    pub fn missing_capability(stage: &'static str) -> Self {
        Self::MissingCapability { stage }
    }
}
