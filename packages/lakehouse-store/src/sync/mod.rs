//! Gold → PostgreSQL
//!
//! Every selected gold table is dropped and recreated from its snapshot in
//! one transaction. The index set is applied afterwards; each index runs in
//! its own savepoint, so a failed index is rolled back alone and the load
//! still commits.

pub mod ddl;

pub use ddl::{chunk_size, IndexDef, GOLD_INDEXES, GOLD_TABLES};

use crate::error::{Result, StorageError};
use lakehouse_etl::config::StoreConfig;
use lakehouse_etl::shared::{column_types, ColumnType, Frame, SnapshotStore, Value};
use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Transaction};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Loaded,
    /// Snapshot missing or empty
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub table: String,
    pub rows: u64,
    pub status: TableStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndexOutcome {
    Created,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub index: String,
    #[serde(flatten)]
    pub outcome: IndexOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub tables: Vec<TableReport>,
    pub indexes: Vec<IndexReport>,
}

impl SyncReport {
    /// Tables that were loaded
    pub fn loaded(&self) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|t| t.status == TableStatus::Loaded)
            .map(|t| t.table.as_str())
            .collect()
    }

    pub fn summary(&self) -> String {
        self.tables
            .iter()
            .map(|t| format!(" - {:28} | rows={:<8} | {:?}", t.table, t.rows, t.status))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Tables to sync: all, or the named ones in load order
pub fn select_tables<S: AsRef<str>>(only: Option<&[S]>) -> Vec<&'static str> {
    match only {
        None => GOLD_TABLES.to_vec(),
        Some(names) => {
            for n in names {
                if !GOLD_TABLES.contains(&n.as_ref()) {
                    warn!("[sync] unknown gold table {}", n.as_ref());
                }
            }
            GOLD_TABLES
                .iter()
                .copied()
                .filter(|t| names.iter().any(|n| n.as_ref() == *t))
                .collect()
        }
    }
}

/// Gold tables → PostgreSQL
pub struct GoldSynchronizer {
    pool: PgPool,
    gold: SnapshotStore,
    schema: String,
    max_params: usize,
}

impl GoldSynchronizer {
    pub async fn connect(config: &StoreConfig, gold_dir: impl Into<PathBuf>) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&config.url)
            .await
            .map_err(|e| {
                StorageError::database(format!("Failed to connect to PostgreSQL: {}", e))
                    .with_source(e)
            })?;
        Ok(Self::new(pool, config, gold_dir))
    }

    pub fn new(pool: PgPool, config: &StoreConfig, gold_dir: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            gold: SnapshotStore::new(gold_dir),
            schema: config.schema.clone(),
            max_params: config.max_params,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Sync all gold tables, or only `only`
    pub async fn sync<S: AsRef<str>>(&self, only: Option<&[S]>) -> Result<SyncReport> {
        let selected = select_tables(only);
        let mut report = SyncReport::default();
        let mut loaded: BTreeSet<&str> = BTreeSet::new();

        let mut tx = self.pool.begin().await?;
        for table in selected {
            let frame = match self.gold.read(table)? {
                Some(f) if !f.is_empty() && !f.columns().is_empty() => f,
                _ => {
                    warn!("[sync] {} has no data; skipped", table);
                    report.tables.push(TableReport {
                        table: table.to_string(),
                        rows: 0,
                        status: TableStatus::Skipped,
                    });
                    continue;
                }
            };
            let rows = self.load_table(&mut tx, table, &frame).await?;
            info!("[sync] {} loaded ({} rows)", table, rows);
            loaded.insert(table);
            report.tables.push(TableReport {
                table: table.to_string(),
                rows,
                status: TableStatus::Loaded,
            });
        }

        for idx in GOLD_INDEXES.iter().filter(|i| loaded.contains(i.table)) {
            let outcome = self.create_index(&mut tx, idx).await?;
            report.indexes.push(IndexReport {
                index: idx.name.to_string(),
                outcome,
            });
        }

        tx.commit().await?;
        info!("[sync] summary:\n{}", report.summary());
        Ok(report)
    }

    async fn load_table(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        table: &str,
        frame: &Frame,
    ) -> Result<u64> {
        let types = column_types(frame);
        sqlx::query(&ddl::drop_table_sql(&self.schema, table))
            .execute(&mut **tx)
            .await?;
        sqlx::query(&ddl::create_table_sql(
            &self.schema,
            table,
            frame.columns(),
            &types,
        ))
        .execute(&mut **tx)
        .await?;

        let rows_per_insert = chunk_size(self.max_params, frame.columns().len()).ok_or_else(|| {
            StorageError::config(format!(
                "{} has {} columns, more than store.max_params ({})",
                table,
                frame.columns().len(),
                self.max_params
            ))
        })?;
        let prefix = ddl::insert_prefix(&self.schema, table, frame.columns());
        for batch in frame.rows().chunks(rows_per_insert) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(prefix.as_str());
            qb.push_values(batch, |mut b, row| {
                for (cell, ty) in row.iter().zip(&types) {
                    match ty {
                        ColumnType::Int => {
                            b.push_bind(cell.as_i64());
                        }
                        ColumnType::Float => {
                            b.push_bind(as_f64(cell));
                        }
                        ColumnType::Date => {
                            b.push_bind(cell.as_date());
                        }
                        ColumnType::Text => {
                            b.push_bind(as_text(cell));
                        }
                    }
                }
            });
            qb.build().execute(&mut **tx).await?;
        }

        let count: i64 = sqlx::query_scalar(&ddl::count_sql(&self.schema, table))
            .fetch_one(&mut **tx)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn create_index(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        idx: &IndexDef,
    ) -> Result<IndexOutcome> {
        let mut savepoint = sqlx::Connection::begin(&mut **tx).await?;
        match sqlx::query(&idx.create_sql(&self.schema))
            .execute(&mut *savepoint)
            .await
        {
            Ok(_) => {
                savepoint.commit().await?;
                Ok(IndexOutcome::Created)
            }
            Err(e) => {
                warn!("[sync] index {} skipped: {}", idx.name, e);
                savepoint.rollback().await?;
                Ok(IndexOutcome::Failed {
                    error: e.to_string(),
                })
            }
        }
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(other.to_text()),
    }
}
