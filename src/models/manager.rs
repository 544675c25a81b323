use crate::config::Config;
use crate::error::{LifecycleError, RegistryError, Result};
use crate::models::cache::InventoryCache;
use crate::models::download::{DownloadCoordinator, DownloadProgress};
use crate::models::upload::BlobUploader;
use crate::registry::{HttpRegistry, ModelInfo, Registry};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Single entry point for listing, pulling, uploading and deleting models
///
/// Construct once per process and share by reference or `Arc`. Read operations
/// never fail on registry trouble; write operations return typed errors.
pub struct ModelManager {
    registry: Arc<dyn Registry>,
    cache: Arc<InventoryCache>,
    downloads: DownloadCoordinator,
    uploader: BlobUploader,
}

impl ModelManager {
    /// Create manager talking to the registry configured in `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = HttpRegistry::new(&config.registry)?;
        Ok(Self::new(Arc::new(registry), config))
    }

    /// Create manager on top of any registry implementation
    #[must_use]
    pub fn new(registry: Arc<dyn Registry>, config: &Config) -> Self {
        let cache = Arc::new(InventoryCache::new(Duration::from_secs(
            config.cache.ttl_secs,
        )));

        Self {
            downloads: DownloadCoordinator::new(Arc::clone(&registry), Arc::clone(&cache)),
            uploader: BlobUploader::new(
                Arc::clone(&registry),
                Arc::clone(&cache),
                config.upload.clone(),
            ),
            registry,
            cache,
        }
    }

    /// Models known to the registry, served from cache while fresh.
    ///
    /// Registry failures are logged and yield an empty list.
    pub async fn list_models(&self) -> Vec<ModelInfo> {
        if let Some(models) = self.cache.fresh().await {
            tracing::trace!("Inventory cache hit ({} models)", models.len());
            return models;
        }

        let generation = self.cache.begin_fetch().await;
        match self.registry.list().await {
            Ok(models) => {
                tracing::debug!("Fetched {} models from registry", models.len());
                self.cache.store(generation, models.clone()).await;
                models
            }
            Err(e) => {
                tracing::error!(
                    "Failed to list models from {}: {e}",
                    self.registry.registry_name()
                );
                Vec::new()
            }
        }
    }

    /// Look up one model in the inventory
    pub async fn get_model_info(&self, name: &str) -> Result<ModelInfo> {
        self.list_models()
            .await
            .into_iter()
            .find(|m| m.name == name)
            .ok_or_else(|| LifecycleError::NotFound(format!("Model '{name}' is not installed")))
    }

    /// Start a background pull; returns the handle used for polling (the name)
    pub async fn pull_model(&self, name: &str) -> Result<String> {
        self.downloads.pull_model(name).await
    }

    pub async fn get_download_progress(&self, name: &str) -> Result<DownloadProgress> {
        self.downloads.get_download_progress(name).await
    }

    pub async fn get_all_download_progress(&self) -> HashMap<String, DownloadProgress> {
        self.downloads.get_all_download_progress().await
    }

    pub async fn cancel_model_pull(&self, name: &str) -> Result<bool> {
        self.downloads.cancel_model_pull(name).await
    }

    /// Delete a model. Returns `false` if the registry did not know it.
    pub async fn delete_model(&self, name: &str) -> Result<bool> {
        let result = self.registry.delete(name).await;
        self.cache.invalidate().await;

        match result {
            Ok(()) => {
                tracing::info!("Deleted model '{name}'");
                Ok(true)
            }
            Err(RegistryError::NotFound(_)) => {
                tracing::warn!("Delete of unknown model '{name}'");
                Ok(false)
            }
            Err(e) => Err(LifecycleError::UpstreamUnavailable(e)),
        }
    }

    /// Upload an artifact and create a model from it; see [`BlobUploader::upload_model`]
    pub async fn upload_model(
        &self,
        content: Vec<u8>,
        filename: &str,
        name: Option<&str>,
    ) -> Result<String> {
        self.uploader.upload_model(content, filename, name).await
    }

    /// Abort in-flight pulls before the process exits
    pub async fn shutdown(&self) {
        self.downloads.shutdown().await;
    }
}
