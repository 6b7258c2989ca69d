//! Project search: documents, embedder, sinks and the incremental indexer

pub mod document;
pub mod embedder;
pub mod indexer;
pub mod pgvector;
pub mod sink;
pub mod typesense;

pub use document::{compose_text, text_hash, IndexedDocument, SearchDocument};
pub use embedder::{Embedder, HttpEmbedder};
pub use indexer::{IndexSummary, ProjectIndexer};
pub use pgvector::PgVectorSink;
pub use sink::SearchSink;
pub use typesense::TypesenseSink;
