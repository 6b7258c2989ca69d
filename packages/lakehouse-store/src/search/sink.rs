use crate::error::Result;
use crate::search::document::IndexedDocument;
use async_trait::async_trait;
use std::collections::HashMap;

/// Where embedded project documents are stored
#[async_trait]
pub trait SearchSink: Send + Sync {
    /// Create the target collection/table if it does not exist
    async fn ensure_schema(&self) -> Result<()>;

    /// Stored `project_id → text_hash`
    async fn existing_hashes(&self) -> Result<HashMap<String, String>>;

    /// Insert or replace documents by project id
    async fn upsert(&self, documents: &[IndexedDocument]) -> Result<usize>;
}
