// # lineup-core
//
// Core library for monitoring the channel lineups of a media server.
//
// ## Architecture Overview
//
// - **ChannelServer**: Trait for fetching sources and channels from the server
// - **SnapshotStore**: Trait for persisting the last reconciled lineup per source
// - **Notifier**: Trait for delivering reports (email, SMS gateway)
// - **SourceState**: Current vs. previous lineup of one source, and their diff
// - **FleetReconciler**: New / deleted sources and per-source diffs for one fetch
// - **ReportFormatter**: Detailed report and condensed summary
// - **MonitorEngine**: The poll → reconcile → report → persist loop
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Reconciliation is pure; I/O sits behind traits
// 2. **Library-First**: The daemon is a thin layer over this crate
// 3. **Typed Boundary**: Server payloads are validated before the core sees them
// 4. **Deterministic Output**: Every rendered list is sorted

pub mod activity;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod reconciler;
pub mod report;
pub mod snapshot;
pub mod source_state;
pub mod traits;

// Re-export core types for convenience
pub use traits::{ChannelServer, Notifier, SnapshotStore};
pub use engine::{CycleOutcome, MonitorEngine, MonitorEvent};
pub use config::{MonitorConfig, NotifyConfig, ServerConfig};
pub use error::{Error, Result};
pub use model::{ChannelNumber, ChannelRecord, Lineup, RawChannel, RawSource};
pub use reconciler::{FleetReconciler, FleetReconciliationResult, SourceReport};
pub use report::{ReportFormatter, ReportHeader};
pub use snapshot::{FileSnapshotStore, MemorySnapshotStore};
pub use source_state::{LineupDiff, SourceState};
