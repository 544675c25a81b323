use crate::config::RegistryConfig;
use crate::error::{LifecycleError, RegistryError, Result};
use crate::registry::ndjson::decode_stream;
use crate::registry::{CreateRequest, ModelInfo, PullStream, Registry, RegistryResult};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{header, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Ollama-compatible registry over HTTP
pub struct HttpRegistry {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl std::fmt::Debug for HttpRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRegistry")
            .field("client", &"Client { ... }")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

impl HttpRegistry {
    /// Create new registry client from config
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(LifecycleError::Config(format!(
                "registry.base_url must be an http(s) URL, got '{}'",
                config.base_url
            )));
        }

        // No client-wide timeout: pulls may run for hours
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| LifecycleError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Pass 2xx through, turn everything else into a status error with the body
    async fn check(response: Response) -> RegistryResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(RegistryError::Status {
            status: status.as_u16(),
            body: error_message(&body),
        })
    }
}

/// Registry error bodies look like `{"error": "..."}`; fall back to the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl Registry for HttpRegistry {
    async fn list(&self) -> RegistryResult<Vec<ModelInfo>> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .timeout(self.timeout)
            .send()
            .await?;

        let tags: TagsResponse = Self::check(response).await?.json().await?;
        Ok(tags.models)
    }

    async fn delete(&self, name: &str) -> RegistryResult<()> {
        let response = self
            .client
            .delete(self.url("/api/delete"))
            .json(&json!({ "model": name }))
            .timeout(self.timeout)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound(format!("model '{name}'")));
        }

        Self::check(response).await?;
        Ok(())
    }

    async fn has_blob(&self, digest: &str) -> RegistryResult<bool> {
        let response = self
            .client
            .head(self.url(&format!("/api/blobs/{digest}")))
            .timeout(self.timeout)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            _ => Self::check(response).await.map(|_| true),
        }
    }

    async fn push_blob(&self, digest: &str, content: Vec<u8>) -> RegistryResult<()> {
        let size = content.len();
        let response = self
            .client
            .post(self.url(&format!("/api/blobs/{digest}")))
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(content)
            .send()
            .await?;

        Self::check(response).await?;
        tracing::debug!("Pushed blob {digest} ({size} bytes)");
        Ok(())
    }

    async fn create(&self, request: &CreateRequest) -> RegistryResult<()> {
        let response = self
            .client
            .post(self.url("/api/create"))
            .json(request)
            .timeout(self.timeout)
            .send()
            .await?;

        let body = Self::check(response).await?.text().await?;

        // A 200 can still carry {"error": ...} from the create pipeline
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&body) {
            if let Some(err) = value["error"].as_str() {
                return Err(RegistryError::Status {
                    status: 200,
                    body: err.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn pull(&self, name: &str) -> RegistryResult<PullStream> {
        let response = self
            .client
            .post(self.url("/api/pull"))
            .header(header::ACCEPT, "application/x-ndjson")
            .json(&json!({ "model": name, "stream": true }))
            .send()
            .await?;

        let response = Self::check(response).await?;
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(RegistryError::from));

        Ok(decode_stream(bytes))
    }

    fn registry_name(&self) -> &str {
        &self.base_url
    }
}
