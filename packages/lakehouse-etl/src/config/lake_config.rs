//! `LakeConfig`: directories, store, embedding service and search index
//!
//! YAML schema v1:
//!
//! ```yaml
//! version: 1
//! paths:
//!   data_dir: /lake
//! store:
//!   url: postgres://...
//! embed:
//!   url: https://.../embed
//!   api_key: ...
//! search:
//!   backend: typesense
//! surrogate_keys: stable_hash
//! ```

use super::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const SUPPORTED_VERSIONS: &[u32] = &[1];

/// How generated dimension keys are assigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurrogateKeys {
    /// First-seen position after dedup, starting at 1
    #[default]
    Ordinal,
    /// Positive 63-bit integer derived from SHA-256 of the natural key
    StableHash,
}

impl FromStr for SurrogateKeys {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ordinal" => Ok(SurrogateKeys::Ordinal),
            "stable_hash" | "stable-hash" | "hash" => Ok(SurrogateKeys::StableHash),
            other => Err(format!("expected 'ordinal' or 'stable_hash', got '{}'", other)),
        }
    }
}

/// Which search sink the indexer writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchBackend {
    #[default]
    Pgvector,
    Typesense,
}

impl FromStr for SearchBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pgvector" | "postgres" | "supabase" => Ok(SearchBackend::Pgvector),
            "typesense" => Ok(SearchBackend::Typesense),
            other => Err(format!("expected 'pgvector' or 'typesense', got '{}'", other)),
        }
    }
}

impl fmt::Display for SearchBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchBackend::Pgvector => write!(f, "pgvector"),
            SearchBackend::Typesense => write!(f, "typesense"),
        }
    }
}

/// Lake directories. Layer directories default to `<data_dir>/<layer>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LakePaths {
    pub data_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bronze_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub silver_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gold_dir: Option<PathBuf>,
    /// Where the bronze mtime map is persisted between sensor cycles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtimes_path: Option<PathBuf>,
}

impl Default for LakePaths {
    fn default() -> Self {
        Self::rooted("/lake")
    }
}

impl LakePaths {
    /// All layers under one root
    pub fn rooted(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            bronze_dir: None,
            silver_dir: None,
            gold_dir: None,
            mtimes_path: None,
        }
    }

    pub fn bronze_dir(&self) -> PathBuf {
        self.bronze_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("bronze"))
    }

    pub fn silver_dir(&self) -> PathBuf {
        self.silver_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("silver"))
    }

    pub fn gold_dir(&self) -> PathBuf {
        self.gold_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("gold"))
    }

    pub fn mtimes_path(&self) -> PathBuf {
        self.mtimes_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(".state").join("bronze_mtimes.json"))
    }
}

/// Relational store holding the gold tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    pub url: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Upper bound on bind parameters per INSERT statement
    #[serde(default = "default_max_params")]
    pub max_params: usize,
}

impl StoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            schema: default_schema(),
            max_params: default_max_params(),
        }
    }
}

/// Embedding service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbedConfig {
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_embed_batch")]
    pub batch_size: usize,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Typesense connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypesenseConfig {
    pub host: String,
    #[serde(default = "default_typesense_port")]
    pub port: u16,
    #[serde(default = "default_typesense_protocol")]
    pub protocol: String,
    pub api_key: String,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl TypesenseConfig {
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }
}

/// Search index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    #[serde(default)]
    pub backend: SearchBackend,
    /// pgvector table name
    #[serde(default = "default_search_table")]
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typesense: Option<TypesenseConfig>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: SearchBackend::default(),
            table: default_search_table(),
            typesense: None,
        }
    }
}

/// Complete lake configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LakeConfig {
    /// Schema version (always 1 for v1)
    pub version: Option<u32>,
    #[serde(default)]
    pub paths: LakePaths,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed: Option<EmbedConfig>,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub surrogate_keys: SurrogateKeys,
    /// Sensor poll interval
    #[serde(default = "default_poke_interval")]
    pub poke_interval_secs: u64,
}

impl Default for LakeConfig {
    fn default() -> Self {
        Self {
            version: Some(1),
            paths: LakePaths::default(),
            store: None,
            embed: None,
            search: SearchConfig::default(),
            surrogate_keys: SurrogateKeys::default(),
            poke_interval_secs: default_poke_interval(),
        }
    }
}

impl LakeConfig {
    /// Defaults rooted at `data_dir`, no store, no embedder
    pub fn rooted(data_dir: impl AsRef<Path>) -> Self {
        Self {
            paths: LakePaths::rooted(data_dir),
            ..Self::default()
        }
    }

    /// Load from an optional YAML file, then apply process environment.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(p) => Self::from_yaml_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let config: LakeConfig = serde_yaml::from_str(content)?;
        match config.version {
            None => Err(ConfigError::MissingVersion),
            Some(v) if !SUPPORTED_VERSIONS.contains(&v) => Err(ConfigError::UnsupportedVersion {
                found: v,
                supported: SUPPORTED_VERSIONS.to_vec(),
            }),
            Some(_) => Ok(config),
        }
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Overlay environment variables read through `lookup`.
    ///
    /// Store, embed and Typesense sections are created from the environment
    /// only when their required variables are present.
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DATA_DIR") {
            self.paths.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("BRONZE_DIR") {
            self.paths.bronze_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("SILVER_DIR") {
            self.paths.silver_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("GOLD_DIR") {
            self.paths.gold_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("LAKE_MTIMES_PATH") {
            self.paths.mtimes_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("SURROGATE_KEYS") {
            self.surrogate_keys = parse_env("SURROGATE_KEYS", &v)?;
        }

        if let Some(url) = get("SUPABASE_DB_URL") {
            match self.store.as_mut() {
                Some(store) => store.url = url,
                None => self.store = Some(StoreConfig::new(url)),
            }
        }

        let embed_url = get("SUPABASE_EMBED_URL");
        let embed_key = get("SUPABASE_SERVICE_ROLE_KEY");
        match (self.embed.as_mut(), embed_url, embed_key) {
            (Some(embed), url, key) => {
                if let Some(url) = url {
                    embed.url = url;
                }
                if let Some(key) = key {
                    embed.api_key = key;
                }
            }
            (None, Some(url), Some(api_key)) => {
                self.embed = Some(EmbedConfig {
                    url,
                    api_key,
                    batch_size: default_embed_batch(),
                    dims: default_dims(),
                    timeout_secs: default_timeout_secs(),
                });
            }
            _ => {}
        }
        if let Some(embed) = self.embed.as_mut() {
            if let Some(v) = get("EMBED_BATCH") {
                embed.batch_size = parse_env("EMBED_BATCH", &v)?;
            }
            if let Some(v) = get("EMBEDDING_DIMS") {
                embed.dims = parse_env("EMBEDDING_DIMS", &v)?;
            }
        }

        if let Some(v) = get("SEARCH_TABLE") {
            self.search.table = v;
        }
        if let Some(v) = get("SEARCH_BACKEND") {
            self.search.backend = parse_env("SEARCH_BACKEND", &v)?;
        }

        let ts_host = get("TYPESENSE_HOST");
        let ts_key = get("TYPESENSE_API_KEY");
        match (self.search.typesense.as_mut(), ts_host, ts_key) {
            (Some(ts), host, key) => {
                if let Some(host) = host {
                    ts.host = host;
                }
                if let Some(key) = key {
                    ts.api_key = key;
                }
            }
            (None, Some(host), Some(api_key)) => {
                self.search.typesense = Some(TypesenseConfig {
                    host,
                    port: default_typesense_port(),
                    protocol: default_typesense_protocol(),
                    api_key,
                    collection: default_collection(),
                });
            }
            _ => {}
        }
        if let Some(ts) = self.search.typesense.as_mut() {
            if let Some(v) = get("TYPESENSE_PORT") {
                ts.port = parse_env("TYPESENSE_PORT", &v)?;
            }
            if let Some(v) = get("TYPESENSE_PROTOCOL") {
                ts.protocol = v;
            }
            if let Some(v) = get("TYPESENSE_COLLECTION") {
                ts.collection = v;
            }
        }
        Ok(())
    }

    /// Range checks on every configured section
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(store) = &self.store {
            if store.max_params == 0 || store.max_params > PG_MAX_BIND_PARAMS {
                return Err(ConfigError::range(
                    "store.max_params",
                    store.max_params,
                    format!("Must be between 1 and {}.", PG_MAX_BIND_PARAMS),
                ));
            }
            if store.url.trim().is_empty() {
                return Err(ConfigError::range("store.url", "\"\"", "Must not be empty."));
            }
        }
        if let Some(embed) = &self.embed {
            if embed.batch_size == 0 {
                return Err(ConfigError::range(
                    "embed.batch_size",
                    embed.batch_size,
                    "Must be at least 1.",
                ));
            }
            if embed.dims == 0 {
                return Err(ConfigError::range("embed.dims", embed.dims, "Must be at least 1."));
            }
        }
        if let Some(ts) = &self.search.typesense {
            if ts.port == 0 {
                return Err(ConfigError::range("search.typesense.port", ts.port, "Must be 1..=65535."));
            }
            if ts.protocol != "http" && ts.protocol != "https" {
                return Err(ConfigError::range(
                    "search.typesense.protocol",
                    &ts.protocol,
                    "Use 'http' or 'https'.",
                ));
            }
        }
        if self.poke_interval_secs == 0 {
            return Err(ConfigError::range(
                "poke_interval_secs",
                self.poke_interval_secs,
                "Must be at least 1.",
            ));
        }
        Ok(())
    }

    pub fn require_store(&self) -> ConfigResult<&StoreConfig> {
        self.store
            .as_ref()
            .ok_or_else(|| ConfigError::missing("relational store", "SUPABASE_DB_URL"))
    }

    pub fn require_embed(&self) -> ConfigResult<&EmbedConfig> {
        self.embed.as_ref().ok_or_else(|| {
            ConfigError::missing(
                "embedding service",
                "SUPABASE_EMBED_URL and SUPABASE_SERVICE_ROLE_KEY",
            )
        })
    }

    pub fn require_typesense(&self) -> ConfigResult<&TypesenseConfig> {
        self.search
            .typesense
            .as_ref()
            .ok_or_else(|| ConfigError::missing("typesense", "TYPESENSE_HOST and TYPESENSE_API_KEY"))
    }

    /// Create bronze, silver and gold directories (idempotent)
    pub fn ensure_dirs(&self) -> ConfigResult<()> {
        for dir in [
            self.paths.bronze_dir(),
            self.paths.silver_dir(),
            self.paths.gold_dir(),
        ] {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}

fn parse_env<T>(var: &str, value: &str) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| ConfigError::Env {
        var: var.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn default_schema() -> String {
    "public".to_string()
}

/// PostgreSQL's limit on bind parameters in one statement
pub const PG_MAX_BIND_PARAMS: usize = 65_535;

fn default_max_params() -> usize {
    60_000
}

fn default_embed_batch() -> usize {
    128
}

fn default_dims() -> usize {
    384
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_typesense_port() -> u16 {
    8108
}

fn default_typesense_protocol() -> String {
    "http".to_string()
}

fn default_collection() -> String {
    "projects".to_string()
}

fn default_search_table() -> String {
    "project_search".to_string()
}

fn default_poke_interval() -> u64 {
    15
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_layer_dirs_default_under_data_dir() {
        let config = LakeConfig::rooted("/tmp/lake");
        assert_eq!(config.paths.bronze_dir(), PathBuf::from("/tmp/lake/bronze"));
        assert_eq!(config.paths.gold_dir(), PathBuf::from("/tmp/lake/gold"));
    }

    #[test]
    fn test_env_overrides_paths() {
        let mut config = LakeConfig::default();
        config
            .apply_env(env(&[("DATA_DIR", "/data"), ("GOLD_DIR", "/elsewhere/gold")]))
            .unwrap();
        assert_eq!(config.paths.silver_dir(), PathBuf::from("/data/silver"));
        assert_eq!(config.paths.gold_dir(), PathBuf::from("/elsewhere/gold"));
    }

    #[test]
    fn test_env_creates_store_and_embed() {
        let mut config = LakeConfig::default();
        config
            .apply_env(env(&[
                ("SUPABASE_DB_URL", "postgres://localhost/lake"),
                ("SUPABASE_EMBED_URL", "http://embed"),
                ("SUPABASE_SERVICE_ROLE_KEY", "k"),
                ("EMBED_BATCH", "32"),
            ]))
            .unwrap();
        assert_eq!(config.require_store().unwrap().max_params, 60_000);
        assert_eq!(config.require_embed().unwrap().batch_size, 32);
    }

    #[test]
    fn test_embed_needs_both_url_and_key() {
        let mut config = LakeConfig::default();
        config
            .apply_env(env(&[("SUPABASE_EMBED_URL", "http://embed")]))
            .unwrap();
        assert!(matches!(
            config.require_embed(),
            Err(ConfigError::Missing { .. })
        ));
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = LakeConfig::default();
        let err = config
            .apply_env(env(&[("SURROGATE_KEYS", "random")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { .. }));
    }

    #[test]
    fn test_yaml_missing_version() {
        let err = LakeConfig::from_yaml_str("paths:\n  data_dir: /x\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingVersion));
    }

    #[test]
    fn test_yaml_unsupported_version() {
        let err = LakeConfig::from_yaml_str("version: 7\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedVersion { found: 7, .. }));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = LakeConfig::rooted("/lake");
        config.surrogate_keys = SurrogateKeys::StableHash;
        config.store = Some(StoreConfig::new("postgres://x"));
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("version: 1"));
        assert!(yaml.contains("stable_hash"));
        let back = LakeConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let mut config = LakeConfig::default();
        config.embed = Some(EmbedConfig {
            url: "u".into(),
            api_key: "k".into(),
            batch_size: 0,
            dims: 384,
            timeout_secs: 60,
        });
        assert!(matches!(config.validate(), Err(ConfigError::Range { .. })));
    }

    #[test]
    fn test_validate_bounds_max_params() {
        let mut config = LakeConfig::default();
        let mut store = StoreConfig::new("postgres://localhost/lake");
        store.max_params = PG_MAX_BIND_PARAMS + 1;
        config.store = Some(store.clone());
        assert!(matches!(config.validate(), Err(ConfigError::Range { .. })));

        store.max_params = PG_MAX_BIND_PARAMS;
        config.store = Some(store);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ensure_dirs_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = LakeConfig::rooted(dir.path());
        config.ensure_dirs().unwrap();
        config.ensure_dirs().unwrap();
        assert!(dir.path().join("bronze").is_dir());
        assert!(dir.path().join("silver").is_dir());
        assert!(dir.path().join("gold").is_dir());
    }
}
