//! Core traits for the lineup monitor
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`ChannelServer`]: Fetch sources and channels from the media server
//! - [`SnapshotStore`]: Persist the last reconciled lineup of each source
//! - [`Notifier`]: Deliver change reports

pub mod channel_server;
pub mod notifier;
pub mod snapshot_store;

pub use channel_server::ChannelServer;
pub use notifier::Notifier;
pub use snapshot_store::SnapshotStore;
