#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use modelctl::config::Config;
use modelctl::error::RegistryError;
use modelctl::registry::{CreateRequest, ModelInfo, PullEvent, PullStream, Registry, RegistryResult};
use modelctl::{DownloadProgress, ModelManager};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub type PullSender = mpsc::UnboundedSender<RegistryResult<PullEvent>>;

/// In-memory registry with call counters and scripted pulls
#[derive(Default)]
pub struct FakeRegistry {
    pub models: Mutex<Vec<ModelInfo>>,
    pub blobs: Mutex<HashMap<String, usize>>,
    pub created: Mutex<Vec<CreateRequest>>,
    pulls: Mutex<HashMap<String, mpsc::UnboundedReceiver<RegistryResult<PullEvent>>>>,
    pub list_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub push_calls: AtomicUsize,
    pub fail_list: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_has_blob: AtomicBool,
    pub fail_push: AtomicBool,
    pub fail_create: AtomicBool,
}

impl FakeRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_models(names: &[&str]) -> Arc<Self> {
        let registry = Self::default();
        registry
            .models
            .lock()
            .unwrap()
            .extend(names.iter().map(|name| model(name, "sha256:00", 1)));
        Arc::new(registry)
    }

    /// Prepare the next pull of `name`; events sent on the returned channel
    /// are streamed, dropping it ends the stream
    pub fn script_pull(&self, name: &str) -> PullSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.pulls.lock().unwrap().insert(name.to_string(), rx);
        tx
    }

    pub fn lists(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn pushes(&self) -> usize {
        self.push_calls.load(Ordering::SeqCst)
    }
}

pub fn model(name: &str, digest: &str, size: u64) -> ModelInfo {
    ModelInfo {
        name: name.to_string(),
        modified_at: "2026-01-01T00:00:00Z".to_string(),
        size,
        digest: digest.to_string(),
        details: serde_json::Map::new(),
    }
}

fn server_error(body: &str) -> RegistryError {
    RegistryError::Status {
        status: 500,
        body: body.to_string(),
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn list(&self) -> RegistryResult<Vec<ModelInfo>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(RegistryError::Network("connection refused".to_string()));
        }
        Ok(self.models.lock().unwrap().clone())
    }

    async fn delete(&self, name: &str) -> RegistryResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(server_error("delete exploded"));
        }

        let mut models = self.models.lock().unwrap();
        let before = models.len();
        models.retain(|m| m.name != name);
        if models.len() == before {
            return Err(RegistryError::NotFound(format!("model '{name}'")));
        }
        Ok(())
    }

    async fn has_blob(&self, digest: &str) -> RegistryResult<bool> {
        if self.fail_has_blob.load(Ordering::SeqCst) {
            return Err(RegistryError::Timeout);
        }
        Ok(self.blobs.lock().unwrap().contains_key(digest))
    }

    async fn push_blob(&self, digest: &str, content: Vec<u8>) -> RegistryResult<()> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_push.load(Ordering::SeqCst) {
            return Err(RegistryError::Status {
                status: 400,
                body: "digest mismatch".to_string(),
            });
        }
        self.blobs
            .lock()
            .unwrap()
            .insert(digest.to_string(), content.len());
        Ok(())
    }

    async fn create(&self, request: &CreateRequest) -> RegistryResult<()> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(server_error("invalid model file"));
        }

        let digest = request.files.values().next().cloned().unwrap_or_default();
        let size = self.blobs.lock().unwrap().get(&digest).copied().unwrap_or(0) as u64;

        let mut models = self.models.lock().unwrap();
        models.retain(|m| m.name != request.model);
        models.push(model(&request.model, &digest, size));
        self.created.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn pull(&self, name: &str) -> RegistryResult<PullStream> {
        let rx = self.pulls.lock().unwrap().remove(name).ok_or_else(|| RegistryError::Status {
            status: 500,
            body: "pull model manifest: file does not exist".to_string(),
        })?;

        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
        .boxed())
    }

    fn registry_name(&self) -> &str {
        "fake"
    }
}

pub fn manager(registry: &Arc<FakeRegistry>) -> ModelManager {
    ModelManager::new(Arc::clone(registry) as Arc<dyn Registry>, &Config::default())
}

pub fn progress_event(completed: u64, total: u64) -> PullEvent {
    PullEvent {
        status: Some("pulling 6a0746a1ec1a".to_string()),
        digest: Some("sha256:6a0746a1ec1a".to_string()),
        completed: Some(completed),
        total: Some(total),
        error: None,
    }
}

/// Poll until the tracked download satisfies `done`, failing after a few seconds
pub async fn wait_for<F>(manager: &ModelManager, name: &str, done: F) -> DownloadProgress
where
    F: Fn(&DownloadProgress) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(progress) = manager.get_download_progress(name).await {
                if done(&progress) {
                    return progress;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("download did not reach expected state")
}
