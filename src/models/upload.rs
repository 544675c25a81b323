use crate::config::UploadConfig;
use crate::error::{LifecycleError, Result};
use crate::models::cache::InventoryCache;
use crate::registry::{CreateRequest, Registry};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;

/// Uploads model artifacts as content-addressed blobs and creates models from them
pub struct BlobUploader {
    registry: Arc<dyn Registry>,
    cache: Arc<InventoryCache>,
    config: UploadConfig,
}

impl BlobUploader {
    #[must_use]
    pub fn new(
        registry: Arc<dyn Registry>,
        cache: Arc<InventoryCache>,
        config: UploadConfig,
    ) -> Self {
        Self {
            registry,
            cache,
            config,
        }
    }

    /// Upload `content` and create a model from it, returning the model name.
    ///
    /// Names, explicit or derived from the file stem, are trimmed and must not
    /// contain whitespace: `My Model.gguf` is rejected as `InvalidArgument`
    /// before the registry is contacted.
    ///
    /// The content buffer is consumed; it is dropped as soon as the blob is
    /// known to the registry, whichever way the call exits.
    pub async fn upload_model(
        &self,
        content: Vec<u8>,
        filename: &str,
        explicit_name: Option<&str>,
    ) -> Result<String> {
        let artifact = artifact_filename(filename, &self.config.extension)?;
        let name = match explicit_name {
            Some(name) => validate_name(name)?,
            None => derive_model_name(artifact, &self.config.extension)?,
        };

        let size = content.len();
        let (content, digest) = tokio::task::spawn_blocking(move || {
            let digest = blob_digest(&content);
            (content, digest)
        })
        .await
        .map_err(|e| LifecycleError::Other(format!("Hashing task failed: {e}")))?;

        tracing::info!("Uploading '{artifact}' as '{name}' ({size} bytes, {digest})");

        let exists = self
            .registry
            .has_blob(&digest)
            .await
            .map_err(LifecycleError::UploadFailed)?;

        if exists {
            tracing::info!("Blob {digest} already present, skipping transfer");
            drop(content);
        } else {
            self.registry
                .push_blob(&digest, content)
                .await
                .map_err(LifecycleError::UploadFailed)?;
        }

        let request =
            CreateRequest::from_blob(&name, artifact, &digest, self.config.parameters.clone());
        let created = self.registry.create(&request).await;
        self.cache.invalidate().await;
        created.map_err(LifecycleError::UploadFailed)?;

        tracing::info!("Created model '{name}' from {digest}");
        Ok(name)
    }
}

/// `sha256:<hex>` digest used as the blob key
#[must_use]
pub fn blob_digest(content: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(content))
}

/// Final path component of `filename`, provided it carries the expected extension
fn artifact_filename<'a>(filename: &'a str, extension: &str) -> Result<&'a str> {
    let artifact = Path::new(filename)
        .file_name()
        .and_then(|f| f.to_str())
        .ok_or_else(|| LifecycleError::InvalidArgument(format!("Invalid filename '{filename}'")))?;

    let has_extension = Path::new(artifact)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension));

    if !has_extension {
        return Err(LifecycleError::InvalidArgument(format!(
            "'{filename}' is not a .{extension} file"
        )));
    }
    Ok(artifact)
}

/// Lower-cased file stem
fn derive_model_name(artifact: &str, extension: &str) -> Result<String> {
    let stem = &artifact[..artifact.len() - extension.len() - 1];
    validate_name(&stem.to_lowercase())
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LifecycleError::InvalidArgument(
            "model name must not be empty".to_string(),
        ));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(LifecycleError::InvalidArgument(format!(
            "model name '{name}' must not contain whitespace"
        )));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_digest() {
        assert_eq!(
            blob_digest(b""),
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            blob_digest(b"abc"),
            "sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_artifact_filename() {
        assert_eq!(artifact_filename("Mistral-7B.gguf", "gguf").unwrap(), "Mistral-7B.gguf");
        assert_eq!(artifact_filename("/tmp/up/phi3.GGUF", "gguf").unwrap(), "phi3.GGUF");
        assert!(matches!(
            artifact_filename("weights.safetensors", "gguf"),
            Err(LifecycleError::InvalidArgument(_))
        ));
        assert!(artifact_filename("gguf", "gguf").is_err());
        assert!(artifact_filename("", "gguf").is_err());
    }

    #[test]
    fn test_derive_model_name() {
        assert_eq!(derive_model_name("Mistral-7B.gguf", "gguf").unwrap(), "mistral-7b");
        assert_eq!(derive_model_name("phi3.Q4_K_M.GGUF", "gguf").unwrap(), "phi3.q4_k_m");
        assert!(derive_model_name(".gguf", "gguf").is_err());
        assert!(derive_model_name("my model.gguf", "gguf").is_err());
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  tutor:latest ").unwrap(), "tutor:latest");
        assert!(validate_name("   ").is_err());
    }
}
