//! Fleet-wide reconciliation
//!
//! The [`FleetReconciler`] owns one [`SourceState`] per monitored source and
//! the [`SnapshotStore`] holding what was seen last. Each cycle it:
//!
//! 1. Drops sources without a lineup identifier (not monitored)
//! 2. Updates existing states, or seeds new ones from their snapshot
//! 3. Classifies new sources (no snapshot) and deleted sources (snapshot but
//!    absent from the fetch), archiving the latter
//! 4. Returns a [`FleetReconciliationResult`] for rendering
//!
//! Snapshots are written separately by [`FleetReconciler::persist`], once the
//! cycle's notifications have gone out.
//!
//! A failed store call leaves the in-memory states untouched, so the next
//! cycle diffs against the same lineups and reports the changes again.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::model::{Lineup, RawSource};
use crate::source_state::{LineupDiff, SourceState};
use crate::traits::SnapshotStore;

/// Reconciliation outcome for one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub name: String,
    /// No snapshot existed: report the whole lineup instead of a diff
    pub is_new: bool,
    pub source_url: Option<String>,
    pub diff: LineupDiff,
    /// Lineup as fetched this cycle
    pub lineup: Lineup,
}

impl SourceReport {
    /// Whether this source belongs in the change report
    pub fn is_reportable(&self) -> bool {
        self.is_new || self.diff.has_lineup_changes()
    }
}

/// Per-cycle aggregate over all sources
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FleetReconciliationResult {
    /// Fetched sources with no snapshot
    pub new_sources: BTreeSet<String>,
    /// Snapshotted sources missing from the fetch
    pub deleted_sources: BTreeSet<String>,
    /// Every monitored source, keyed by name
    pub per_source: BTreeMap<String, SourceReport>,
    /// Fetched sources without a lineup identifier
    pub skipped_sources: BTreeSet<String>,
}

impl FleetReconciliationResult {
    /// Whether anything worth reporting happened
    pub fn has_changes(&self) -> bool {
        !self.new_sources.is_empty()
            || !self.deleted_sources.is_empty()
            || self.per_source.values().any(SourceReport::is_reportable)
    }

    /// Sources to render, in name order
    pub fn reportable_sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.per_source.values().filter(|s| s.is_reportable())
    }
}

/// Reconciles fetched sources against persisted snapshots
pub struct FleetReconciler {
    store: Box<dyn SnapshotStore>,
    states: BTreeMap<String, SourceState>,
}

impl FleetReconciler {
    pub fn new(store: Box<dyn SnapshotStore>) -> Self {
        Self {
            store,
            states: BTreeMap::new(),
        }
    }

    /// State of a source currently tracked in memory
    pub fn state(&self, source_name: &str) -> Option<&SourceState> {
        self.states.get(source_name)
    }

    /// Number of sources tracked in memory
    pub fn tracked_count(&self) -> usize {
        self.states.len()
    }

    /// Reconcile one fetch
    ///
    /// # Parameters
    ///
    /// - `sources`: Everything the server returned this cycle
    /// - `source_urls`: Display URLs by source name (missing entries mean no URL)
    pub async fn reconcile(
        &mut self,
        sources: &[RawSource],
        source_urls: &BTreeMap<String, String>,
    ) -> Result<FleetReconciliationResult> {
        let mut result = FleetReconciliationResult::default();

        // Committed only once every store call has succeeded
        let mut staged = self.states.clone();

        let on_disk: BTreeSet<String> = self.store.list_sources().await?.into_iter().collect();
        let mut fetched: BTreeSet<String> = BTreeSet::new();

        for source in sources {
            if !source.is_monitored() {
                debug!("Source {} has no lineup, skipping", source.name);
                result.skipped_sources.insert(source.name.clone());
                continue;
            }

            if !fetched.insert(source.name.clone()) {
                warn!("Source {} returned twice, ignoring duplicate", source.name);
                continue;
            }

            let is_new = match staged.get_mut(&source.name) {
                Some(state) => {
                    state.update_from_raw(source);
                    false
                }
                None => {
                    let known = on_disk.contains(&source.name);
                    let previous = if known {
                        self.store.load(&source.name).await?
                    } else {
                        Lineup::new()
                    };
                    staged.insert(
                        source.name.clone(),
                        SourceState::from_raw(source, previous),
                    );
                    !known
                }
            };

            if is_new {
                info!("New source: {}", source.name);
                result.new_sources.insert(source.name.clone());
            }

            if let Some(state) = staged.get_mut(&source.name) {
                state.set_source_url(source_urls.get(&source.name).cloned());
            }
        }

        // Still on the server, only without a lineup: not a deletion
        for name in &result.skipped_sources {
            if !fetched.contains(name) {
                staged.remove(name);
            }
        }

        let vanished: BTreeSet<String> = on_disk
            .iter()
            .chain(staged.keys())
            .filter(|name| !fetched.contains(*name) && !result.skipped_sources.contains(*name))
            .cloned()
            .collect();

        for name in &vanished {
            self.store.archive(name).await?;
        }

        for name in vanished {
            info!("Source deleted: {}", name);
            staged.remove(&name);
            result.deleted_sources.insert(name);
        }

        self.states = staged;

        for state in self.states.values() {
            result.per_source.insert(
                state.name().to_string(),
                SourceReport {
                    name: state.name().to_string(),
                    is_new: result.new_sources.contains(state.name()),
                    source_url: state.source_url().map(str::to_string),
                    diff: state.diff().clone(),
                    lineup: state.current().clone(),
                },
            );
        }

        Ok(result)
    }

    /// Write the current lineup of every tracked source
    ///
    /// # Returns
    ///
    /// The number of snapshots written
    pub async fn persist(&self) -> Result<usize> {
        for state in self.states.values() {
            self.store.save(state.name(), state.current()).await?;
        }
        debug!("Persisted {} snapshots", self.states.len());
        Ok(self.states.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::ChannelRecord;
    use crate::snapshot::MemorySnapshotStore;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory store whose next `archive` can be made to fail
    #[derive(Clone, Default)]
    struct FlakyArchiveStore {
        inner: MemorySnapshotStore,
        fail_next_archive: Arc<AtomicBool>,
    }

    #[async_trait]
    impl SnapshotStore for FlakyArchiveStore {
        async fn load(&self, source_name: &str) -> Result<Lineup> {
            self.inner.load(source_name).await
        }

        async fn save(&self, source_name: &str, lineup: &Lineup) -> Result<()> {
            self.inner.save(source_name, lineup).await
        }

        async fn list_sources(&self) -> Result<Vec<String>> {
            self.inner.list_sources().await
        }

        async fn archive(&self, source_name: &str) -> Result<()> {
            if self.fail_next_archive.swap(false, Ordering::SeqCst) {
                return Err(Error::snapshot("disk full"));
            }
            self.inner.archive(source_name).await
        }
    }

    fn named(name: &str, channels: &[(&str, &str)]) -> RawSource {
        channels
            .iter()
            .fold(RawSource::new(name, Some("OTA")), |s, (n, channel)| {
                s.with_channel(n, channel)
            })
    }

    fn tuner(channels: &[(&str, &str)]) -> RawSource {
        channels
            .iter()
            .fold(RawSource::new("Tuner", Some("OTA")), |s, (n, name)| {
                s.with_channel(n, name)
            })
    }

    #[tokio::test]
    async fn test_first_sight_without_snapshot_is_new() {
        let store = MemorySnapshotStore::new();
        let mut reconciler = FleetReconciler::new(Box::new(store.clone()));

        let result = reconciler
            .reconcile(&[tuner(&[("1", "A")])], &BTreeMap::new())
            .await
            .unwrap();

        assert!(result.new_sources.contains("Tuner"));
        assert!(result.per_source["Tuner"].is_new);
        assert!(result.has_changes());
    }

    #[tokio::test]
    async fn test_seeded_from_snapshot() {
        let snapshot: Lineup = vec![ChannelRecord::new("1", "A"), ChannelRecord::new("2", "B")]
            .into_iter()
            .collect();
        let store = MemorySnapshotStore::with_snapshots([("Tuner".to_string(), snapshot)]);
        let mut reconciler = FleetReconciler::new(Box::new(store));

        let result = reconciler
            .reconcile(
                &[tuner(&[("1", "A"), ("2", "C"), ("3", "D")])],
                &BTreeMap::new(),
            )
            .await
            .unwrap();

        assert!(result.new_sources.is_empty());
        let report = &result.per_source["Tuner"];
        assert!(!report.is_new);
        assert_eq!(report.diff.modified_by_number.len(), 1);
        assert_eq!(report.diff.added_by_number.len(), 1);
        assert_eq!(report.diff.count_delta_label(), "+1");
    }

    #[tokio::test]
    async fn test_skips_sources_without_lineup() {
        let store = MemorySnapshotStore::new();
        let mut reconciler = FleetReconciler::new(Box::new(store));

        let unmonitored = RawSource::new("Virtual", None).with_channel("1", "X");
        let result = reconciler
            .reconcile(&[unmonitored], &BTreeMap::new())
            .await
            .unwrap();

        assert!(result.per_source.is_empty());
        assert!(result.skipped_sources.contains("Virtual"));
        assert!(!result.has_changes());
    }

    #[tokio::test]
    async fn test_source_urls_attached() {
        let store = MemorySnapshotStore::new();
        let mut reconciler = FleetReconciler::new(Box::new(store));
        let urls = BTreeMap::from([("Tuner".to_string(), "http://m3u.example/list".to_string())]);

        let result = reconciler.reconcile(&[tuner(&[])], &urls).await.unwrap();
        assert_eq!(
            result.per_source["Tuner"].source_url.as_deref(),
            Some("http://m3u.example/list")
        );
    }

    #[tokio::test]
    async fn test_failed_archive_keeps_changes_for_next_cycle() {
        let store = FlakyArchiveStore::default();
        let mut reconciler = FleetReconciler::new(Box::new(store.clone()));
        let urls = BTreeMap::new();

        reconciler
            .reconcile(&[named("A", &[("1", "X")]), named("B", &[("5", "Y")])], &urls)
            .await
            .unwrap();
        reconciler.persist().await.unwrap();

        let changed = [named("A", &[("1", "X"), ("2", "NEW")])];
        store.fail_next_archive.store(true, Ordering::SeqCst);
        assert!(reconciler.reconcile(&changed, &urls).await.is_err());

        // Nothing advanced: A still holds its first lineup, B is still tracked
        assert_eq!(reconciler.tracked_count(), 2);
        assert_eq!(reconciler.state("A").unwrap().channel_count(), 1);

        let retried = reconciler.reconcile(&changed, &urls).await.unwrap();
        let added: Vec<_> = retried.per_source["A"]
            .diff
            .added_by_number
            .keys()
            .map(|n| n.as_str())
            .collect();
        assert_eq!(added, vec!["2"]);
        assert!(retried.deleted_sources.contains("B"));
        assert_eq!(store.inner.archived().await, vec!["B"]);
        assert_eq!(reconciler.tracked_count(), 1);
    }

    #[tokio::test]
    async fn test_unmonitored_source_is_not_deleted() {
        let snapshot: Lineup = vec![ChannelRecord::new("1", "A")].into_iter().collect();
        let store = MemorySnapshotStore::with_snapshots([("Tuner".to_string(), snapshot)]);
        let mut reconciler = FleetReconciler::new(Box::new(store.clone()));

        let result = reconciler
            .reconcile(&[RawSource::new("Tuner", None)], &BTreeMap::new())
            .await
            .unwrap();

        assert!(result.skipped_sources.contains("Tuner"));
        assert!(result.deleted_sources.is_empty());
        assert!(!result.has_changes());
        assert!(store.archived().await.is_empty());
        assert!(store.get("Tuner").await.is_some());
        assert!(reconciler.state("Tuner").is_none());
    }

    #[tokio::test]
    async fn test_source_losing_its_lineup_is_untracked_not_deleted() {
        let store = MemorySnapshotStore::new();
        let mut reconciler = FleetReconciler::new(Box::new(store.clone()));
        let urls = BTreeMap::new();

        reconciler.reconcile(&[tuner(&[("1", "A")])], &urls).await.unwrap();
        assert_eq!(reconciler.tracked_count(), 1);

        let result = reconciler
            .reconcile(&[RawSource::new("Tuner", Some(" "))], &urls)
            .await
            .unwrap();

        assert!(result.deleted_sources.is_empty());
        assert!(store.archived().await.is_empty());
        assert_eq!(reconciler.tracked_count(), 0);
    }
}
