// # Memory Snapshot Store
//
// In-memory implementation of SnapshotStore.
//
// Nothing survives a restart: after one, every source is reported as new.
// Useful for tests and for dry runs against a live server.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::model::Lineup;
use crate::traits::SnapshotStore;

#[derive(Debug, Default)]
struct MemoryState {
    snapshots: BTreeMap<String, Lineup>,
    archived: Vec<String>,
    save_count: usize,
}

/// In-memory snapshot store
///
/// Clones share the same underlying state, so a test can keep a handle while
/// the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    inner: Arc<RwLock<MemoryState>>,
}

impl MemorySnapshotStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with snapshots
    pub fn with_snapshots(snapshots: impl IntoIterator<Item = (String, Lineup)>) -> Self {
        let state = MemoryState {
            snapshots: snapshots.into_iter().collect(),
            ..MemoryState::default()
        };
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Snapshot of a source, if one is stored
    pub async fn get(&self, source_name: &str) -> Option<Lineup> {
        self.inner.read().await.snapshots.get(source_name).cloned()
    }

    /// Names of archived sources, in archive order
    pub async fn archived(&self) -> Vec<String> {
        self.inner.read().await.archived.clone()
    }

    /// Number of `save` calls so far
    pub async fn save_count(&self) -> usize {
        self.inner.read().await.save_count
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self, source_name: &str) -> Result<Lineup, Error> {
        Ok(self.get(source_name).await.unwrap_or_default())
    }

    async fn save(&self, source_name: &str, lineup: &Lineup) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard
            .snapshots
            .insert(source_name.to_string(), lineup.clone());
        guard.save_count += 1;
        Ok(())
    }

    async fn list_sources(&self) -> Result<Vec<String>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.snapshots.keys().cloned().collect())
    }

    async fn archive(&self, source_name: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        if guard.snapshots.remove(source_name).is_some() {
            guard.archived.push(source_name.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChannelRecord;

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemorySnapshotStore::new();
        assert!(store.load("Tuner").await.unwrap().is_empty());

        let lineup: Lineup = vec![ChannelRecord::new("1", "A")].into_iter().collect();
        store.save("Tuner", &lineup).await.unwrap();

        assert_eq!(store.load("Tuner").await.unwrap(), lineup);
        assert_eq!(store.list_sources().await.unwrap(), vec!["Tuner"]);

        store.archive("Tuner").await.unwrap();
        assert!(store.list_sources().await.unwrap().is_empty());
        assert_eq!(store.archived().await, vec!["Tuner"]);
    }
}
