//! lakehouse-store: gold tables into PostgreSQL and project search
//!
//! - [`sync`]: drop-and-reload of gold tables in one transaction
//! - [`search`]: hash-gated embedding of `dim_project` into pgvector or Typesense

pub mod error;
pub mod search;
pub mod sync;

pub use error::{ErrorKind, Result, StorageError};
pub use search::{Embedder, HttpEmbedder, IndexSummary, ProjectIndexer, SearchSink};
pub use sync::{GoldSynchronizer, SyncReport};
