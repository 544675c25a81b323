use crate::error::{LifecycleError, RegistryError, Result};
use crate::models::cache::InventoryCache;
use crate::registry::{PullEvent, Registry};
use futures_util::StreamExt;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Full scale of [`DownloadProgress::pull_progress`]
pub const PROGRESS_SCALE: u16 = 1000;

/// Progress of one pull, as seen by pollers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadProgress {
    pub model: String,
    pub digest: Option<String>,
    /// Per-mille, 0..=1000
    pub pull_progress: u16,
    pub done: bool,
    pub error: Option<String>,
    pub started_at: String,
}

impl DownloadProgress {
    #[must_use]
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            digest: None,
            pull_progress: 0,
            done: false,
            error: None,
            started_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Fold one stream event into the record. Progress never moves backwards:
    /// multi-layer pulls report each layer from zero.
    pub fn apply(&mut self, event: &PullEvent) {
        if self.done {
            return;
        }

        if let Some(digest) = &event.digest {
            self.digest = Some(digest.clone());
        }

        if let (Some(completed), Some(total)) = (event.completed, event.total) {
            if let Some(value) = per_mille(completed, total) {
                self.pull_progress = self.pull_progress.max(value);
            }
        }
    }

    pub fn complete(&mut self) {
        if self.done {
            return;
        }
        self.pull_progress = PROGRESS_SCALE;
        self.done = true;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        if self.done {
            return;
        }
        self.error = Some(message.into());
        self.done = true;
    }
}

/// `floor(completed / total * 1000)` clamped to the scale; `None` when total is unknown
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn per_mille(completed: u64, total: u64) -> Option<u16> {
    if total == 0 {
        return None;
    }
    let value = u128::from(completed) * u128::from(PROGRESS_SCALE) / u128::from(total);
    Some(value.min(u128::from(PROGRESS_SCALE)) as u16)
}

struct PullEntry {
    /// Distinguishes this pull from earlier or later ones for the same name
    id: u64,
    progress: DownloadProgress,
    task: Option<JoinHandle<()>>,
}

type PullMap = Arc<Mutex<HashMap<String, PullEntry>>>;

/// Tracks at most one in-flight pull per model name
pub struct DownloadCoordinator {
    registry: Arc<dyn Registry>,
    cache: Arc<InventoryCache>,
    pulls: PullMap,
    next_id: AtomicU64,
}

impl DownloadCoordinator {
    #[must_use]
    pub fn new(registry: Arc<dyn Registry>, cache: Arc<InventoryCache>) -> Self {
        Self {
            registry,
            cache,
            pulls: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Start pulling `name` in the background and return its handle (the name)
    pub async fn pull_model(&self, name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LifecycleError::InvalidArgument(
                "model name must not be empty".to_string(),
            ));
        }

        // Held across spawn so the task cannot observe the map before its entry exists
        let mut pulls = self.pulls.lock().await;
        if pulls.get(name).is_some_and(|entry| !entry.progress.done) {
            return Err(LifecycleError::Conflict(format!(
                "Model '{name}' is already being pulled"
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let task = PullTask {
            registry: Arc::clone(&self.registry),
            cache: Arc::clone(&self.cache),
            pulls: Arc::clone(&self.pulls),
            name: name.to_string(),
            id,
        };
        let handle = tokio::spawn(task.run());

        pulls.insert(
            name.to_string(),
            PullEntry {
                id,
                progress: DownloadProgress::new(name),
                task: Some(handle),
            },
        );

        tracing::info!("Started pull of '{name}' from {}", self.registry.registry_name());
        Ok(name.to_string())
    }

    pub async fn get_download_progress(&self, name: &str) -> Result<DownloadProgress> {
        self.pulls
            .lock()
            .await
            .get(name)
            .map(|entry| entry.progress.clone())
            .ok_or_else(|| LifecycleError::NotFound(format!("No download tracked for '{name}'")))
    }

    pub async fn get_all_download_progress(&self) -> HashMap<String, DownloadProgress> {
        self.pulls
            .lock()
            .await
            .iter()
            .map(|(name, entry)| (name.clone(), entry.progress.clone()))
            .collect()
    }

    /// Stop tracking `name`, abort its task and delete whatever was pulled.
    ///
    /// This applies to terminal records too: cancelling a finished pull removes
    /// the model it installed.
    pub async fn cancel_model_pull(&self, name: &str) -> Result<bool> {
        let entry = self
            .pulls
            .lock()
            .await
            .remove(name)
            .ok_or_else(|| LifecycleError::NotFound(format!("No download tracked for '{name}'")))?;

        if let Some(task) = &entry.task {
            task.abort();
        }

        match self.registry.delete(name).await {
            Ok(()) => tracing::info!("Cancelled pull of '{name}' and removed the pulled model"),
            Err(RegistryError::NotFound(_)) => {
                tracing::info!("Cancelled pull of '{name}' (nothing to clean up)");
            }
            Err(e) => tracing::warn!("Cancelled pull of '{name}' but cleanup failed: {e}"),
        }
        self.cache.invalidate().await;

        Ok(true)
    }

    /// Abort every running pull task, marking its record as interrupted
    pub async fn shutdown(&self) {
        let mut pulls = self.pulls.lock().await;
        for (name, entry) in pulls.iter_mut() {
            if entry.progress.done {
                continue;
            }
            tracing::info!("Aborting pull of '{name}'");
            if let Some(task) = entry.task.take() {
                task.abort();
            }
            entry.progress.fail("interrupted by shutdown");
        }
    }
}

impl Drop for DownloadCoordinator {
    fn drop(&mut self) {
        if let Ok(pulls) = self.pulls.try_lock() {
            for entry in pulls.values() {
                if let Some(task) = &entry.task {
                    task.abort();
                }
            }
        }
    }
}

/// Background worker owning one pull stream
struct PullTask {
    registry: Arc<dyn Registry>,
    cache: Arc<InventoryCache>,
    pulls: PullMap,
    name: String,
    id: u64,
}

impl PullTask {
    async fn run(self) {
        let mut stream = match self.registry.pull(&self.name).await {
            Ok(stream) => stream,
            Err(e) => {
                self.finish(Err(e.to_string())).await;
                return;
            }
        };

        while let Some(item) = stream.next().await {
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    self.finish(Err(e.to_string())).await;
                    return;
                }
            };

            if let Some(message) = &event.error {
                self.finish(Err(message.clone())).await;
                return;
            }

            let mut pulls = self.pulls.lock().await;
            let Some(progress) = self.own_progress(&mut pulls) else {
                tracing::debug!("Pull of '{}' no longer tracked, stopping", self.name);
                return;
            };
            progress.apply(&event);
            tracing::debug!(
                "Pull '{}': {} ({}‰)",
                self.name,
                event.status.as_deref().unwrap_or("-"),
                progress.pull_progress
            );
        }

        self.finish(Ok(())).await;
    }

    fn own_progress<'a>(
        &self,
        pulls: &'a mut HashMap<String, PullEntry>,
    ) -> Option<&'a mut DownloadProgress> {
        pulls
            .get_mut(&self.name)
            .filter(|entry| entry.id == self.id)
            .map(|entry| &mut entry.progress)
    }

    async fn finish(&self, outcome: std::result::Result<(), String>) {
        {
            let mut pulls = self.pulls.lock().await;
            let Some(progress) = self.own_progress(&mut pulls) else {
                tracing::debug!("Pull of '{}' no longer tracked, dropping outcome", self.name);
                return;
            };

            match outcome {
                Ok(()) => {
                    progress.complete();
                    tracing::info!("Pulled '{}'", self.name);
                }
                Err(message) => {
                    tracing::warn!("Pull of '{}' failed: {message}", self.name);
                    progress.fail(message);
                }
            }
        }

        self.cache.invalidate().await;
    }
}
