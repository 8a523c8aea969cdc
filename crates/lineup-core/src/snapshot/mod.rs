// # Snapshot Store Implementations
//
// This module provides implementations of the SnapshotStore trait, and the
// line-oriented format shared by the file store.

pub mod file;
pub mod format;
pub mod memory;

pub use file::FileSnapshotStore;
pub use memory::MemorySnapshotStore;
