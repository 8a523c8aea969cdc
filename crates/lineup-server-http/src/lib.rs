// # HTTP Channel Server
//
// This crate provides the `ChannelServer` implementation for the Channels DVR
// HTTP API.
//
// ## Endpoints
//
// - `GET /devices`: every source with its channels
// - `GET /status`: server version
// - `GET /providers/m3u/sources/<id>`: configured URL of an M3U source
//
// ## Architecture
//
// One request per call, no retries, no caching. The JSON payload is decoded
// into private DTOs and validated into `RawSource`s before it reaches the core,
// so the core never sees a half-formed device.

use std::time::Duration;

use lineup_core::config::ServerConfig;
use lineup_core::model::{RawChannel, RawSource};
use lineup_core::traits::ChannelServer;
use lineup_core::{Error, Result};
use serde::Deserialize;
use serde_json::Value;

/// Request timeout for every call to the server
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Device ID prefix of M3U sources, absent from the provider endpoint path
const M3U_PREFIX: &str = "M3U-";

/// Channels DVR server reached over HTTP
pub struct HttpChannelServer {
    /// `http://host:port`
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpChannelServer {
    /// Create a client for the given server
    pub fn new(server: &ServerConfig) -> Self {
        Self::with_base_url(server.base_url())
    }

    /// Create a client for an explicit base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
        }
    }

    async fn get_text(&self, path: &str) -> std::result::Result<String, reqwest::Error> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {}", url);
        self.client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

#[async_trait::async_trait]
impl ChannelServer for HttpChannelServer {
    async fn fetch_sources(&self) -> Result<Vec<RawSource>> {
        let body = self
            .get_text("/devices")
            .await
            .map_err(|e| Error::server_offline(format!("{}/devices: {}", self.base_url, e)))?;

        let sources = decode_devices(&body)?;
        tracing::debug!("Fetched {} sources", sources.len());
        Ok(sources)
    }

    async fn server_version(&self) -> Result<String> {
        let body = self
            .get_text("/status")
            .await
            .map_err(|e| Error::server_offline(format!("{}/status: {}", self.base_url, e)))?;

        let status: StatusDto = serde_json::from_str(&body)
            .map_err(|e| Error::malformed_source(format!("Invalid /status payload: {}", e)))?;
        Ok(status.version.unwrap_or_default().trim().to_string())
    }

    async fn source_url(&self, source: &RawSource) -> Option<String> {
        let path = source_url_path(source)?;
        match self.get_text(&path).await {
            Ok(body) => decode_source_url(&body),
            Err(e) => {
                tracing::debug!("No URL for source {}: {}", source.name, e);
                None
            }
        }
    }

    fn base_url(&self) -> String {
        self.base_url.clone()
    }
}

#[derive(Debug, Deserialize)]
struct DeviceDto {
    #[serde(rename = "FriendlyName")]
    friendly_name: Option<String>,
    #[serde(rename = "Lineup")]
    lineup: Option<String>,
    #[serde(rename = "DeviceID")]
    device_id: Option<String>,
    #[serde(rename = "Channels", default)]
    channels: Option<Vec<ChannelDto>>,
}

#[derive(Debug, Deserialize)]
struct ChannelDto {
    #[serde(rename = "GuideNumber")]
    guide_number: Option<Value>,
    #[serde(rename = "GuideName")]
    guide_name: Option<Value>,
    #[serde(rename = "ID")]
    id: Option<Value>,
    #[serde(rename = "HD")]
    hd: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct StatusDto {
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SourceSettingsDto {
    url: Option<String>,
}

/// Decode a `/devices` payload into validated sources
pub fn decode_devices(body: &str) -> Result<Vec<RawSource>> {
    let devices: Vec<DeviceDto> = serde_json::from_str(body)
        .map_err(|e| Error::malformed_source(format!("Invalid /devices payload: {}", e)))?;

    devices
        .into_iter()
        .enumerate()
        .map(|(index, device)| device.into_source(index))
        .collect()
}

impl DeviceDto {
    fn into_source(self, index: usize) -> Result<RawSource> {
        let name = self
            .friendly_name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| {
                Error::malformed_source(format!("Device #{} has no FriendlyName", index))
            })?;

        let channels = self
            .channels
            .unwrap_or_default()
            .into_iter()
            .map(|channel| channel.into_raw(&name))
            .collect::<Result<Vec<_>>>()?;

        Ok(RawSource {
            name,
            lineup_id: self.lineup,
            device_id: self.device_id,
            channels,
        })
    }
}

impl ChannelDto {
    fn into_raw(self, source: &str) -> Result<RawChannel> {
        let guide_number = self.guide_number.as_ref().and_then(scalar_text);
        let guide_name = self.guide_name.as_ref().and_then(scalar_text);

        let (Some(guide_number), Some(guide_name)) = (guide_number, guide_name) else {
            return Err(Error::malformed_source(format!(
                "Channel without GuideNumber/GuideName in {}",
                source
            )));
        };

        Ok(RawChannel {
            guide_number,
            guide_name,
            id: self.id.as_ref().and_then(scalar_text),
            hd: self.hd.as_ref().and_then(flag),
        })
    }
}

/// String or number as text; anything else is absent
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `true`/`false` or `1`/`0`
fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        _ => None,
    }
}

/// Provider endpoint path of a source, when it has a device ID
fn source_url_path(source: &RawSource) -> Option<String> {
    let device_id = source.device_id.as_deref()?.trim();
    if device_id.is_empty() {
        return None;
    }
    let id = device_id.strip_prefix(M3U_PREFIX).unwrap_or(device_id);
    Some(format!("/providers/m3u/sources/{}", id))
}

fn decode_source_url(body: &str) -> Option<String> {
    serde_json::from_str::<SourceSettingsDto>(body)
        .ok()?
        .url
        .filter(|url| !url.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICES: &str = r#"[
        {
            "FriendlyName": "HDHomeRun",
            "Lineup": "USA-OTA98101",
            "DeviceID": "1053C0CA",
            "Channels": [
                { "GuideNumber": "2.1", "GuideName": "KTVU", "ID": "abc", "HD": 1 },
                { "GuideNumber": "7", "GuideName": "KGO", "HD": false }
            ]
        },
        {
            "FriendlyName": "Pluto TV",
            "Lineup": "X-M3U",
            "DeviceID": "M3U-Pluto",
            "Channels": [ { "GuideNumber": 100, "GuideName": "News" } ]
        },
        { "FriendlyName": "TVE", "Channels": [] }
    ]"#;

    #[test]
    fn test_decode_devices() {
        let sources = decode_devices(DEVICES).unwrap();
        assert_eq!(sources.len(), 3);

        let hdhr = &sources[0];
        assert_eq!(hdhr.name, "HDHomeRun");
        assert!(hdhr.is_monitored());
        assert_eq!(hdhr.channels[0].id.as_deref(), Some("abc"));
        assert_eq!(hdhr.channels[0].hd, Some(true));
        assert_eq!(hdhr.channels[1].id, None);
        assert_eq!(hdhr.channels[1].hd, Some(false));

        assert_eq!(sources[1].channels[0].guide_number, "100");
        assert_eq!(sources[1].channels[0].hd, None);

        assert!(!sources[2].is_monitored());
    }

    #[test]
    fn test_missing_friendly_name_is_malformed() {
        let err = decode_devices(r#"[ { "Lineup": "X", "Channels": [] } ]"#).unwrap_err();
        assert!(matches!(err, Error::MalformedSource(_)));
    }

    #[test]
    fn test_channel_without_name_is_malformed() {
        let body = r#"[ { "FriendlyName": "Tuner", "Channels": [ { "GuideNumber": "5" } ] } ]"#;
        assert!(matches!(
            decode_devices(body),
            Err(Error::MalformedSource(_))
        ));
    }

    #[test]
    fn test_not_json_is_malformed() {
        assert!(matches!(
            decode_devices("<html>busy</html>"),
            Err(Error::MalformedSource(_))
        ));
    }

    #[test]
    fn test_source_url_path_strips_m3u_prefix() {
        let mut source = RawSource::new("Pluto TV", Some("X-M3U"));
        assert_eq!(source_url_path(&source), None);

        source.device_id = Some("M3U-Pluto".to_string());
        assert_eq!(
            source_url_path(&source).as_deref(),
            Some("/providers/m3u/sources/Pluto")
        );

        source.device_id = Some("1053C0CA".to_string());
        assert_eq!(
            source_url_path(&source).as_deref(),
            Some("/providers/m3u/sources/1053C0CA")
        );
    }

    #[test]
    fn test_decode_source_url() {
        assert_eq!(
            decode_source_url(r#"{ "url": "http://pluto.example/playlist.m3u" }"#).as_deref(),
            Some("http://pluto.example/playlist.m3u")
        );
        assert_eq!(decode_source_url(r#"{ "name": "x" }"#), None);
        assert_eq!(decode_source_url("not json"), None);
    }

    #[test]
    fn test_base_url_from_config() {
        let server = HttpChannelServer::new(&ServerConfig::new("10.0.0.5", 8089));
        assert_eq!(server.base_url(), "http://10.0.0.5:8089");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_offline() {
        // Port 9 (discard) is not expected to run an HTTP server
        let server = HttpChannelServer::with_base_url("http://127.0.0.1:9");
        let err = server.fetch_sources().await.unwrap_err();
        assert!(err.is_offline());

        let source = RawSource {
            device_id: Some("M3U-Pluto".to_string()),
            ..RawSource::new("Pluto TV", Some("X-M3U"))
        };
        assert_eq!(server.source_url(&source).await, None);
    }
}
