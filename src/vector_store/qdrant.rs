//! Qdrant REST client

use crate::config::VectorStoreConfig;
use crate::vector_store::{
    CollectionDescriptor, EnsureOutcome, Point, VectorStore, VectorStoreError,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

/// Vector store backed by the Qdrant REST API
pub struct QdrantStore {
    client: Client,
    base_url: String,
}

impl QdrantStore {
    /// Builds a new Qdrant client
    pub fn new(config: &VectorStoreConfig) -> Result<Self, VectorStoreError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            let value = HeaderValue::from_str(key.trim())
                .map_err(|_| VectorStoreError::Unavailable("invalid Qdrant API key".into()))?;
            headers.insert("api-key", value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn collection_url(&self, name: &str) -> String {
        format!("{}/collections/{}", self.base_url, name)
    }

    /// Fetches collection info; `None` when the collection does not exist
    async fn collection_info(&self, name: &str) -> Result<Option<Value>, VectorStoreError> {
        let resp = self.client.get(self.collection_url(name)).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = check_status(resp).await?;
        let body: Value = resp
            .json()
            .await
            .map_err(|e| VectorStoreError::Malformed(e.to_string()))?;
        Ok(Some(body))
    }

    async fn create_collection(
        &self,
        descriptor: &CollectionDescriptor,
    ) -> Result<StatusCode, VectorStoreError> {
        let body = json!({
            "vectors": {
                "size": descriptor.dimensions,
                "distance": descriptor.distance,
            }
        });
        let resp = self
            .client
            .put(self.collection_url(&descriptor.name))
            .json(&body)
            .send()
            .await?;

        // Another writer created it between our check and this call
        if resp.status() == StatusCode::CONFLICT {
            return Ok(StatusCode::CONFLICT);
        }
        let resp = check_status(resp).await?;
        Ok(resp.status())
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(
        &self,
        descriptor: &CollectionDescriptor,
    ) -> Result<EnsureOutcome, VectorStoreError> {
        if let Some(info) = self.collection_info(&descriptor.name).await? {
            return Ok(EnsureOutcome::Existing {
                dimensions: vector_size(&info),
            });
        }

        match self.create_collection(descriptor).await? {
            StatusCode::CONFLICT => {
                let info = self.collection_info(&descriptor.name).await?;
                Ok(EnsureOutcome::Existing {
                    dimensions: info.as_ref().and_then(vector_size),
                })
            }
            _ => Ok(EnsureOutcome::Created),
        }
    }

    async fn recreate_collection(
        &self,
        descriptor: &CollectionDescriptor,
    ) -> Result<(), VectorStoreError> {
        let resp = self
            .client
            .delete(self.collection_url(&descriptor.name))
            .send()
            .await?;
        if resp.status() != StatusCode::NOT_FOUND {
            check_status(resp).await?;
        }

        self.create_collection(descriptor).await?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, point: Point) -> Result<(), VectorStoreError> {
        let body = json!({ "points": [point] });
        let resp = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url(collection)))
            .json(&body)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn collection_stats(&self, collection: &str) -> Result<u64, VectorStoreError> {
        let info = self
            .collection_info(collection)
            .await?
            .ok_or_else(|| VectorStoreError::Malformed(format!("collection {} not found", collection)))?;

        Ok(info
            .pointer("/result/points_count")
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }
}

/// Turns a non-success response into an error carrying its body
async fn check_status(resp: Response) -> Result<Response, VectorStoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    Err(VectorStoreError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Vector size of an unnamed-vector collection, from a collection info response
fn vector_size(info: &Value) -> Option<usize> {
    info.pointer("/result/config/params/vectors/size")
        .and_then(Value::as_u64)
        .map(|size| size as usize)
}
