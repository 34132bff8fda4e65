use anyhow::{anyhow, Context, Result};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::env;
use std::time::Duration;
use tracing::info;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub document_id: String,
    pub page_hash: String,
    pub page_number: u32,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PointInsert {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoredPoint {
    pub score: f32,
    pub payload: ChunkPayload,
}

#[derive(Clone)]
pub struct QdrantStore {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl QdrantStore {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let timeout = env::var("QDRANT_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .context("failed to build qdrant http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.http.request(method, url);
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key);
        }
        builder
    }

    pub fn collection_exists(&self, name: &str) -> Result<bool> {
        let response = self
            .request(Method::GET, &format!("/collections/{name}"))
            .send()
            .context("qdrant collection lookup failed")?;
        if response.status().is_success() {
            return Ok(true);
        }
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Err(anyhow!(
            "qdrant collection lookup returned {}",
            response.status()
        ))
    }

    pub fn ensure_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        if self.collection_exists(name)? {
            info!(collection = name, "collection already exists");
            return Ok(());
        }
        let body = json!({
            "vectors": { "size": dimensions, "distance": "Cosine" },
        });
        let response = self
            .request(Method::PUT, &format!("/collections/{name}"))
            .json(&body)
            .send()
            .context("qdrant collection create failed")?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "qdrant collection create returned {}",
                response.status()
            ));
        }
        info!(collection = name, dimensions, "collection created");
        Ok(())
    }

    pub fn upsert(&self, name: &str, points: &[PointInsert]) -> Result<usize> {
        if points.is_empty() {
            return Ok(0);
        }
        let body = json!({ "points": points });
        let response = self
            .request(Method::PUT, &format!("/collections/{name}/points?wait=true"))
            .json(&body)
            .send()
            .context("qdrant upsert failed")?;
        if !response.status().is_success() {
            return Err(anyhow!("qdrant upsert returned {}", response.status()));
        }
        Ok(points.len())
    }

    pub fn search(&self, name: &str, vector: &[f32], limit: usize) -> Result<Vec<ScoredPoint>> {
        let body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        let response = self
            .request(Method::POST, &format!("/collections/{name}/points/search"))
            .json(&body)
            .send()
            .context("qdrant search failed")?;
        if !response.status().is_success() {
            return Err(anyhow!("qdrant search returned {}", response.status()));
        }
        let parsed: SearchResponse = response
            .json()
            .context("failed to decode qdrant search response")?;
        Ok(parsed.result)
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_trimmed() {
        let store = QdrantStore::new("http://localhost:6333/", None).unwrap();
        assert_eq!(store.base_url, "http://localhost:6333");
    }

    #[test]
    fn point_insert_serializes_with_payload_fields() {
        let point = PointInsert {
            id: "00000000-0000-0000-0000-000000000000".to_string(),
            vector: vec![0.1, 0.2],
            payload: ChunkPayload {
                document_id: "doc".to_string(),
                page_hash: "hash".to_string(),
                page_number: 2,
                content: "chunk text".to_string(),
            },
        };
        let value = serde_json::to_value(&point).unwrap();
        assert_eq!(value["payload"]["page_number"], 2);
        assert_eq!(value["payload"]["content"], "chunk text");
        assert_eq!(value["vector"].as_array().unwrap().len(), 2);
    }
}
