pub mod http;
pub mod ndjson;

use crate::config::GenerationParameters;
use crate::error::RegistryError;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use http::HttpRegistry;

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Lazy, non-restartable sequence of pull events. A new pull re-issues the request.
pub type PullStream = BoxStream<'static, RegistryResult<PullEvent>>;

/// Snapshot of a model as reported by the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub modified_at: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// One line of a pull response
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PullEvent {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub digest: Option<String>,
    #[serde(default)]
    pub completed: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Manifest for creating a model out of an already uploaded blob
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateRequest {
    pub model: String,
    /// Artifact filename -> blob digest
    pub files: BTreeMap<String, String>,
    pub parameters: GenerationParameters,
    pub stream: bool,
}

impl CreateRequest {
    #[must_use]
    pub fn from_blob(
        model: &str,
        filename: &str,
        digest: &str,
        parameters: GenerationParameters,
    ) -> Self {
        Self {
            model: model.to_string(),
            files: BTreeMap::from([(filename.to_string(), digest.to_string())]),
            parameters,
            stream: false,
        }
    }
}

/// Remote model registry operations
///
/// Implementations perform no retries; every failure is reported once.
#[async_trait]
pub trait Registry: Send + Sync {
    /// List every model the registry holds
    async fn list(&self) -> RegistryResult<Vec<ModelInfo>>;

    /// Delete a model by name. Unknown models are `RegistryError::NotFound`.
    async fn delete(&self, name: &str) -> RegistryResult<()>;

    /// Check whether a blob with this digest (`sha256:<hex>`) exists
    async fn has_blob(&self, digest: &str) -> RegistryResult<bool>;

    /// Upload raw bytes under a digest
    async fn push_blob(&self, digest: &str, content: Vec<u8>) -> RegistryResult<()>;

    /// Create a model from a manifest referencing uploaded blobs
    async fn create(&self, request: &CreateRequest) -> RegistryResult<()>;

    /// Start pulling a model; progress arrives through the returned stream
    async fn pull(&self, name: &str) -> RegistryResult<PullStream>;

    /// Get registry name for logging/debugging
    fn registry_name(&self) -> &str;
}
