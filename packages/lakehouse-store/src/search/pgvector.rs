//! pgvector sink: `project_search` table with IVFFlat and HNSW indexes

use crate::error::Result;
use crate::search::document::IndexedDocument;
use crate::search::sink::SearchSink;
use crate::sync::ddl::quote_ident;
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use std::collections::HashMap;
use tracing::info;

pub struct PgVectorSink {
    pool: PgPool,
    table: String,
    dims: usize,
}

impl PgVectorSink {
    pub fn new(pool: PgPool, table: impl Into<String>, dims: usize) -> Self {
        Self {
            pool,
            table: table.into(),
            dims,
        }
    }
}

fn create_table_sql(table: &str, dims: usize) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\
         project_id TEXT PRIMARY KEY, \
         title TEXT, \
         abstract TEXT, \
         country TEXT, \
         year INT, \
         text_hash TEXT NOT NULL, \
         embedding VECTOR({}))",
        quote_ident(table),
        dims
    )
}

fn index_sql(table: &str) -> [String; 2] {
    [
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} USING ivfflat (embedding vector_l2_ops) WITH (lists = 100)",
            quote_ident(&format!("{}_ivf_idx", table)),
            quote_ident(table)
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} USING hnsw (embedding vector_l2_ops)",
            quote_ident(&format!("{}_hnsw_idx", table)),
            quote_ident(table)
        ),
    ]
}

fn upsert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {} (project_id, title, abstract, country, year, text_hash, embedding) \
         VALUES ($1, $2, $3, $4, $5, $6, $7::vector) \
         ON CONFLICT (project_id) DO UPDATE SET \
         title = EXCLUDED.title, \
         abstract = EXCLUDED.abstract, \
         country = EXCLUDED.country, \
         year = EXCLUDED.year, \
         text_hash = EXCLUDED.text_hash, \
         embedding = EXCLUDED.embedding",
        quote_ident(table)
    )
}

/// pgvector text literal: `[0.1,0.2]`
pub fn vector_literal(v: &[f32]) -> String {
    let parts: Vec<String> = v.iter().map(|x| x.to_string()).collect();
    format!("[{}]", parts.join(","))
}

#[async_trait]
impl SearchSink for PgVectorSink {
    async fn ensure_schema(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&mut *tx)
            .await?;
        sqlx::query(&create_table_sql(&self.table, self.dims))
            .execute(&mut *tx)
            .await?;
        for sql in index_sql(&self.table) {
            sqlx::query(&sql).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        info!("[pgvector] {} ready (dims={})", self.table, self.dims);
        Ok(())
    }

    async fn existing_hashes(&self) -> Result<HashMap<String, String>> {
        let rows = sqlx::query(&format!(
            "SELECT project_id, text_hash FROM {}",
            quote_ident(&self.table)
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| -> Result<(String, String)> {
                Ok((r.try_get("project_id")?, r.try_get("text_hash")?))
            })
            .collect()
    }

    async fn upsert(&self, documents: &[IndexedDocument]) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }
        let sql = upsert_sql(&self.table);
        let mut tx = self.pool.begin().await?;
        for item in documents {
            let d = &item.document;
            sqlx::query(&sql)
                .bind(&d.project_id)
                .bind(&d.title)
                .bind(&d.abstract_text)
                .bind(&d.country)
                .bind(d.year)
                .bind(&d.text_hash)
                .bind(vector_literal(&item.embedding))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(documents.len())
    }
}
