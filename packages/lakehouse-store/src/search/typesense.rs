//! Typesense sink over the HTTP API
//!
//! Documents are keyed by `id = project_id`. Hashes come from the JSONL
//! export; writes go through the JSONL import with `action=upsert`.

use crate::error::{Result, StorageError};
use crate::search::document::IndexedDocument;
use crate::search::sink::SearchSink;
use async_trait::async_trait;
use lakehouse_etl::config::TypesenseConfig;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

const API_KEY_HEADER: &str = "X-TYPESENSE-API-KEY";

pub struct TypesenseSink {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    collection: String,
    dims: usize,
}

#[derive(Serialize)]
struct TypesenseDocument<'a> {
    id: &'a str,
    project_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(rename = "abstract", skip_serializing_if = "Option::is_none")]
    abstract_text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    country: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    year: Option<i32>,
    text_hash: &'a str,
    embedding: &'a [f32],
}

#[derive(Deserialize)]
struct ExportLine {
    id: String,
    #[serde(default)]
    text_hash: Option<String>,
}

#[derive(Deserialize)]
struct ImportLine {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Collection schema for project documents
pub fn collection_schema(name: &str, dims: usize) -> serde_json::Value {
    json!({
        "name": name,
        "fields": [
            {"name": "project_id", "type": "string"},
            {"name": "title", "type": "string", "optional": true},
            {"name": "abstract", "type": "string", "optional": true},
            {"name": "country", "type": "string", "facet": true, "optional": true},
            {"name": "year", "type": "int32", "facet": true, "optional": true},
            {"name": "text_hash", "type": "string", "index": false, "optional": true},
            {"name": "embedding", "type": "float[]", "num_dim": dims, "optional": true},
        ]
    })
}

/// Encode documents as one JSON object per line
pub fn to_jsonl(documents: &[IndexedDocument]) -> Result<String> {
    let mut out = String::new();
    for item in documents {
        let d = &item.document;
        let line = serde_json::to_string(&TypesenseDocument {
            id: &d.project_id,
            project_id: &d.project_id,
            title: d.title.as_deref(),
            abstract_text: d.abstract_text.as_deref(),
            country: d.country.as_deref(),
            year: d.year,
            text_hash: &d.text_hash,
            embedding: &item.embedding,
        })?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

/// `id → text_hash` from an export body; documents without a hash are left out
pub fn parse_export(body: &str) -> Result<HashMap<String, String>> {
    let mut hashes = HashMap::new();
    for line in body.lines().filter(|l| !l.trim().is_empty()) {
        let entry: ExportLine = serde_json::from_str(line)?;
        if let Some(hash) = entry.text_hash {
            hashes.insert(entry.id, hash);
        }
    }
    Ok(hashes)
}

/// Count imported documents; any failed line is an error
pub fn check_import(body: &str) -> Result<usize> {
    let mut ok = 0;
    let mut failures = Vec::new();
    for line in body.lines().filter(|l| !l.trim().is_empty()) {
        let entry: ImportLine = serde_json::from_str(line)?;
        if entry.success {
            ok += 1;
        } else {
            failures.push(entry.error.unwrap_or_else(|| "unknown error".to_string()));
        }
    }
    if failures.is_empty() {
        Ok(ok)
    } else {
        Err(StorageError::search_index(format!(
            "{} document(s) rejected, first: {}",
            failures.len(),
            failures[0]
        )))
    }
}

impl TypesenseSink {
    pub fn new(config: &TypesenseConfig, dims: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url(),
            api_key: config.api_key.clone(),
            collection: config.collection.clone(),
            dims,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn failed(response: reqwest::Response, what: &str) -> StorageError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        StorageError::http(format!("typesense {} failed ({}): {}", what, status, body))
    }
}

#[async_trait]
impl SearchSink for TypesenseSink {
    async fn ensure_schema(&self) -> Result<()> {
        let response = self
            .client
            .get(self.url(&format!("/collections/{}", self.collection)))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        match response.status() {
            s if s.is_success() => return Ok(()),
            StatusCode::NOT_FOUND => {}
            _ => return Err(Self::failed(response, "collection lookup").await),
        }

        let response = self
            .client
            .post(self.url("/collections"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&collection_schema(&self.collection, self.dims))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::failed(response, "collection create").await);
        }
        info!("[typesense] created collection {}", self.collection);
        Ok(())
    }

    async fn existing_hashes(&self) -> Result<HashMap<String, String>> {
        let response = self
            .client
            .get(self.url(&format!(
                "/collections/{}/documents/export?include_fields=id,text_hash",
                self.collection
            )))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            warn!("[typesense] collection {} not found; no hashes", self.collection);
            return Ok(HashMap::new());
        }
        if !response.status().is_success() {
            return Err(Self::failed(response, "export").await);
        }
        parse_export(&response.text().await?)
    }

    async fn upsert(&self, documents: &[IndexedDocument]) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }
        let response = self
            .client
            .post(self.url(&format!(
                "/collections/{}/documents/import?action=upsert",
                self.collection
            )))
            .header(API_KEY_HEADER, &self.api_key)
            .header("Content-Type", "text/plain")
            .body(to_jsonl(documents)?)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::failed(response, "import").await);
        }
        check_import(&response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::search::document::SearchDocument;

    fn doc(id: &str) -> IndexedDocument {
        IndexedDocument {
            document: SearchDocument {
                project_id: id.to_string(),
                title: Some("Alpha".to_string()),
                abstract_text: None,
                country: Some("BE".to_string()),
                year: Some(2021),
                text: "Alpha |  | BE | 2021".to_string(),
                text_hash: "h".to_string(),
            },
            embedding: vec![0.5, 0.25],
        }
    }

    #[test]
    fn test_jsonl_lines() {
        let body = to_jsonl(&[doc("101"), doc("102")]).unwrap();
        let lines: Vec<serde_json::Value> = body
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], "101");
        assert_eq!(lines[0]["country"], "BE");
        assert!(lines[0].get("abstract").is_none());
        assert_eq!(lines[1]["embedding"], json!([0.5, 0.25]));
    }

    #[test]
    fn test_parse_export() {
        let body = "{\"id\":\"101\",\"text_hash\":\"a\"}\n{\"id\":\"102\"}\n\n";
        let hashes = parse_export(body).unwrap();
        assert_eq!(hashes.len(), 1);
        assert_eq!(hashes["101"], "a");
    }

    #[test]
    fn test_import_failure_is_error() {
        assert_eq!(check_import("{\"success\":true}\n{\"success\":true}").unwrap(), 2);
        let err = check_import("{\"success\":true}\n{\"success\":false,\"error\":\"bad field\"}")
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::SearchIndex);
        assert!(err.message.contains("bad field"));
    }

    #[test]
    fn test_schema_carries_dims() {
        let schema = collection_schema("projects", 384);
        assert_eq!(schema["name"], "projects");
        assert_eq!(schema["fields"][6]["num_dim"], 384);
    }
}
