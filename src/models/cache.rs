use crate::registry::ModelInfo;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

struct CacheEntry {
    models: Vec<ModelInfo>,
    fetched_at: Instant,
}

struct CacheState {
    entry: Option<CacheEntry>,
    /// Bumped by every invalidation
    generation: u64,
}

/// TTL-bounded snapshot of the registry's model list
///
/// Entries are replaced wholesale; a fetch that began before an invalidation
/// cannot store its result.
pub struct InventoryCache {
    ttl: Duration,
    state: RwLock<CacheState>,
}

impl InventoryCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(CacheState {
                entry: None,
                generation: 0,
            }),
        }
    }

    /// Cached models, if the entry is younger than the TTL
    pub async fn fresh(&self) -> Option<Vec<ModelInfo>> {
        let state = self.state.read().await;
        state
            .entry
            .as_ref()
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.models.clone())
    }

    /// Token to hand back to [`Self::store`] once the fetch finishes
    pub async fn begin_fetch(&self) -> u64 {
        self.state.read().await.generation
    }

    /// Replace the entry, unless the cache was invalidated since `generation`
    pub async fn store(&self, generation: u64, models: Vec<ModelInfo>) -> bool {
        let mut state = self.state.write().await;
        if state.generation != generation {
            tracing::debug!("Discarding inventory fetched before invalidation");
            return false;
        }

        state.entry = Some(CacheEntry {
            models,
            fetched_at: Instant::now(),
        });
        true
    }

    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        state.entry = None;
        state.generation += 1;
    }
}
