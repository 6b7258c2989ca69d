//! Incremental project indexing
//!
//! Only documents whose text hash is new or differs from the stored one are
//! embedded. Batches are embedded and upserted one at a time; a failure stops
//! the run and leaves earlier batches in place.

use crate::error::{Result, StorageError};
use crate::search::document::{IndexedDocument, SearchDocument};
use crate::search::embedder::Embedder;
use crate::search::sink::SearchSink;
use chrono::{SecondsFormat, Utc};
use lakehouse_etl::shared::SnapshotStore;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

pub const DEFAULT_BATCH_SIZE: usize = 128;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexSummary {
    pub indexed: usize,
    pub unchanged: usize,
    pub seconds: f64,
    /// RFC 3339, UTC
    pub timestamp: String,
}

pub struct ProjectIndexer {
    gold: SnapshotStore,
    embedder: Arc<dyn Embedder>,
    sink: Arc<dyn SearchSink>,
    batch_size: usize,
}

/// Documents whose hash is absent from or different to `existing`
pub fn pending<'a>(
    documents: &'a [SearchDocument],
    existing: &HashMap<String, String>,
) -> Vec<&'a SearchDocument> {
    documents
        .iter()
        .filter(|d| existing.get(&d.project_id) != Some(&d.text_hash))
        .collect()
}

impl ProjectIndexer {
    pub fn new(
        gold_dir: impl Into<PathBuf>,
        embedder: Arc<dyn Embedder>,
        sink: Arc<dyn SearchSink>,
    ) -> Self {
        Self {
            gold: SnapshotStore::new(gold_dir),
            embedder,
            sink,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub async fn run(&self) -> Result<IndexSummary> {
        let start = Instant::now();
        let projects = self.gold.read_or_empty("dim_project")?;
        let documents = SearchDocument::from_frame(&projects);

        self.sink.ensure_schema().await?;
        let existing = self.sink.existing_hashes().await?;
        let todo = pending(&documents, &existing);
        let unchanged = documents.len() - todo.len();
        info!(
            "[index] {} documents, {} to embed, {} unchanged",
            documents.len(),
            todo.len(),
            unchanged
        );

        let mut indexed = 0;
        for (n, batch) in todo.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|d| d.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(StorageError::embedding(format!(
                    "embedder returned {} vectors for {} inputs",
                    vectors.len(),
                    batch.len()
                )));
            }
            let items: Vec<IndexedDocument> = batch
                .iter()
                .zip(vectors)
                .map(|(d, embedding)| IndexedDocument {
                    document: (*d).clone(),
                    embedding,
                })
                .collect();
            indexed += self.sink.upsert(&items).await?;
            debug!("[index] batch {} upserted ({} docs)", n + 1, items.len());
        }

        let summary = IndexSummary {
            indexed,
            unchanged,
            seconds: (start.elapsed().as_secs_f64() * 10.0).round() / 10.0,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        info!("[index] indexed={} seconds={}", summary.indexed, summary.seconds);
        Ok(summary)
    }
}
