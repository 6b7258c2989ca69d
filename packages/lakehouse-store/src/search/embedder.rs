//! Embedding service client

use crate::error::{Result, StorageError};
use async_trait::async_trait;
use lakehouse_etl::config::EmbedConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Text → vector. One vector per input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EmbedResponse {
    Wrapped { embeddings: Vec<Vec<f32>> },
    Bare(Vec<Vec<f32>>),
}

impl EmbedResponse {
    fn into_vectors(self) -> Vec<Vec<f32>> {
        match self {
            EmbedResponse::Wrapped { embeddings } => embeddings,
            EmbedResponse::Bare(v) => v,
        }
    }
}

/// Decode an embedding response body
pub fn parse_embeddings(body: &str) -> Result<Vec<Vec<f32>>> {
    serde_json::from_str::<EmbedResponse>(body)
        .map(EmbedResponse::into_vectors)
        .map_err(|e| {
            StorageError::embedding(format!("unexpected embedder response: {}", e)).with_source(e)
        })
}

/// Embeds over HTTP: `POST {"inputs": [...]}` with a bearer key
pub struct HttpEmbedder {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpEmbedder {
    pub fn new(config: &EmbedConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        debug!("[embed] {} texts → {}", texts.len(), self.url);
        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&EmbedRequest { inputs: texts })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(StorageError::embedding(format!(
                "embedder returned {}: {}",
                status, body
            )));
        }
        parse_embeddings(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_wrapped_response() {
        let v = parse_embeddings(r#"{"embeddings": [[0.1, 0.2], [0.3, 0.4]]}"#).unwrap();
        assert_eq!(v.len(), 2);
        assert_eq!(v[1], vec![0.3, 0.4]);
    }

    #[test]
    fn test_bare_list_response() {
        let v = parse_embeddings("[[1.0]]").unwrap();
        assert_eq!(v, vec![vec![1.0]]);
    }

    #[test]
    fn test_other_shape_is_embedding_error() {
        let err = parse_embeddings(r#"{"data": []}"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Embedding);
    }

    #[test]
    fn test_request_body_shape() {
        let inputs = vec!["a".to_string(), "b".to_string()];
        let body = serde_json::to_value(EmbedRequest { inputs: &inputs }).unwrap();
        assert_eq!(body, serde_json::json!({"inputs": ["a", "b"]}));
    }
}
