//! Lake configuration
//!
//! `LakeConfig` is resolved in two layers: an optional versioned YAML file,
//! then environment variables. Environment always wins.
//!
//! ```rust,ignore
//! use lakehouse_etl::config::LakeConfig;
//!
//! let config = LakeConfig::load(Some(std::path::Path::new("lake.yaml")))?;
//! config.ensure_dirs()?;
//! ```

pub mod error;
pub mod lake_config;

pub use error::{ConfigError, ConfigResult};
pub use lake_config::{
    EmbedConfig, LakeConfig, LakePaths, SearchBackend, SearchConfig, StoreConfig, SurrogateKeys,
    TypesenseConfig, PG_MAX_BIND_PARAMS,
};
