// # Channel Server Trait
//
// Defines the interface to the media server whose lineups are monitored.
//
// ## Implementations
//
// - HTTP (Channels DVR API): `lineup-server-http` crate
//
// ## Contract
//
// Implementations validate the server's payload at this boundary and hand the
// core typed `RawSource`s. A payload that does not match the schema is an
// `Error::MalformedSource`; an unreachable server is an `Error::ServerOffline`.
// Missing optional fields (IDs, HD flags, source URLs) are `None`, never errors.

use async_trait::async_trait;

use crate::model::RawSource;

/// Trait for channel server implementations
///
/// Implementations perform one request per call and never retry. The engine
/// treats a failed fetch as the server going offline.
#[async_trait]
pub trait ChannelServer: Send + Sync {
    /// Fetch every source known to the server, with its channels
    async fn fetch_sources(&self) -> Result<Vec<RawSource>, crate::Error>;

    /// Version string reported by the server
    async fn server_version(&self) -> Result<String, crate::Error>;

    /// URL configured for a source, used for display only
    ///
    /// Any failure resolves to `None`.
    async fn source_url(&self, source: &RawSource) -> Option<String>;

    /// Base URL of the server (for report headers and logging)
    fn base_url(&self) -> String;
}
