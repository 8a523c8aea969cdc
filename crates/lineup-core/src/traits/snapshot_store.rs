// # Snapshot Store Trait
//
// Defines the interface for persisting the last reconciled lineup of each source.
//
// ## Purpose
//
// A snapshot is what the monitor saw for a source at the end of the previous
// cycle. It is the baseline the next cycle diffs against, and the record of
// which sources existed:
// - no snapshot for a fetched source → the source is new
// - a snapshot for a source absent from the fetch → the source was deleted
//
// ## Implementations
//
// - File-based: one line-oriented file per source (`FileSnapshotStore`)
// - In-memory: tests and dry runs (`MemorySnapshotStore`)

use async_trait::async_trait;

use crate::model::Lineup;

/// Trait for snapshot store implementations
///
/// # Thread Safety
///
/// The engine drives one cycle at a time, but implementations must still be
/// `Send + Sync` so the engine can run on any tokio runtime.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the last saved lineup of a source
    ///
    /// # Returns
    ///
    /// - `Ok(Lineup)`: The saved lineup, or an empty lineup when no snapshot
    ///   exists or the snapshot is empty
    /// - `Err(Error)`: Storage error or (in strict mode) a malformed snapshot
    async fn load(&self, source_name: &str) -> Result<Lineup, crate::Error>;

    /// Replace the snapshot of a source
    ///
    /// This is a full replacement, never an incremental patch.
    async fn save(&self, source_name: &str, lineup: &Lineup) -> Result<(), crate::Error>;

    /// Names of all sources with a snapshot
    async fn list_sources(&self) -> Result<Vec<String>, crate::Error>;

    /// Move the snapshot of a source out of the monitored set
    ///
    /// Archiving a source without a snapshot is a no-op.
    async fn archive(&self, source_name: &str) -> Result<(), crate::Error>;
}
