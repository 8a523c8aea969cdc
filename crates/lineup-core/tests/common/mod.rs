//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles for the engine's collaborators.
//! Each double is `Clone` and clones share state, so a test keeps one handle
//! while the engine owns another.

#![allow(dead_code)]

use lineup_core::config::{MonitorConfig, NotifyConfig};
use lineup_core::error::{Error, Result};
use lineup_core::model::RawSource;
use lineup_core::traits::{ChannelServer, Notifier};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const EMAIL_TO: &str = "operator@outlook.com";
pub const SMS_TO: &str = "5551234567@vtext.com";

/// A channel server that replays scripted fetches
///
/// Each `fetch_sources()` call pops the next script entry; `None` entries and
/// an exhausted script behave like an unreachable server.
#[derive(Clone, Default)]
pub struct ScriptedServer {
    script: Arc<Mutex<VecDeque<Option<Vec<RawSource>>>>>,
    fetch_count: Arc<AtomicUsize>,
    version: Option<String>,
}

impl ScriptedServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful fetch
    pub fn then_sources(self, sources: Vec<RawSource>) -> Self {
        self.script.lock().unwrap().push_back(Some(sources));
        self
    }

    /// Queue a failed fetch
    pub fn then_offline(self) -> Self {
        self.script.lock().unwrap().push_back(None);
        self
    }

    /// Report this version instead of the default one
    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ChannelServer for ScriptedServer {
    async fn fetch_sources(&self) -> Result<Vec<RawSource>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(Some(sources)) => Ok(sources),
            _ => Err(Error::server_offline("connection refused")),
        }
    }

    async fn server_version(&self) -> Result<String> {
        Ok(self
            .version
            .clone()
            .unwrap_or_else(|| "2025.01.09.1200".to_string()))
    }

    async fn source_url(&self, source: &RawSource) -> Option<String> {
        source
            .name
            .starts_with("M3U")
            .then(|| format!("http://playlists.example/{}.m3u", source.name))
    }

    fn base_url(&self) -> String {
        "http://127.0.0.1:8089".to_string()
    }
}

/// A sent message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub destination: String,
    pub subject: String,
    pub body: String,
}

/// A notifier that records messages, optionally failing every send
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    attempts: Arc<AtomicUsize>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every send fails (bad credentials, SMTP down, ...)
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, destination: &str, subject: &str, body: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::notify("535 authentication failed"));
        }
        self.sent.lock().unwrap().push(SentMessage {
            destination: destination.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "recording"
    }
}

/// Build a monitored source from `(number, name)` pairs
pub fn source(name: &str, channels: &[(&str, &str)]) -> RawSource {
    channels
        .iter()
        .fold(RawSource::new(name, Some("X-LINEUP")), |s, (number, channel)| {
            s.with_channel(number, channel)
        })
}

/// Configuration rooted in `data_dir`, notifying both destinations
pub fn config_with_notify(data_dir: &Path) -> MonitorConfig {
    MonitorConfig {
        data_dir: data_dir.to_path_buf(),
        notify: NotifyConfig {
            sender: Some("monitor@gmail.com".to_string()),
            password: Some("app-password".to_string()),
            email_recipient: Some(EMAIL_TO.to_string()),
            sms_address: Some(SMS_TO.to_string()),
        },
        ..MonitorConfig::default()
    }
}

/// Configuration rooted in `data_dir`, log-only
pub fn config_log_only(data_dir: &Path) -> MonitorConfig {
    MonitorConfig {
        data_dir: data_dir.to_path_buf(),
        ..MonitorConfig::default()
    }
}
