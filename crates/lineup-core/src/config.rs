//! Configuration types for the lineup monitor
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Lowest accepted polling period, to avoid hammering the server
pub const MIN_FREQUENCY_MINUTES: u64 = 5;

/// Main monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Media server to monitor
    #[serde(default)]
    pub server: ServerConfig,

    /// Minutes between two checks
    #[serde(default = "default_frequency_minutes")]
    pub frequency_minutes: u64,

    /// Root of all persisted state; each server gets its own subdirectory
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Email / SMS delivery
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Change log settings
    #[serde(default)]
    pub log: LogConfig,

    /// Fail on malformed snapshot lines instead of skipping them
    #[serde(default)]
    pub strict_snapshots: bool,
}

impl MonitorConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            server: ServerConfig::default(),
            frequency_minutes: default_frequency_minutes(),
            data_dir: default_data_dir(),
            notify: NotifyConfig::default(),
            log: LogConfig::default(),
            strict_snapshots: false,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.frequency_minutes < MIN_FREQUENCY_MINUTES {
            return Err(crate::Error::config(format!(
                "Minimum frequency is {} minutes, got {}",
                MIN_FREQUENCY_MINUTES, self.frequency_minutes
            )));
        }

        if self.data_dir.as_os_str().is_empty() {
            return Err(crate::Error::config("Data directory cannot be empty"));
        }

        self.server.validate()?;
        self.notify.validate()?;

        Ok(())
    }

    /// Directory holding the snapshots and logs of the configured server
    pub fn server_dir(&self) -> PathBuf {
        self.data_dir.join(self.server.dir_name())
    }

    /// Time between two checks
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.frequency_minutes * 60)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Media server address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Validate the server configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.host.trim().is_empty() {
            return Err(crate::Error::config("Server host cannot be empty"));
        }
        if self.port == 0 {
            return Err(crate::Error::config("Server port must be > 0"));
        }
        Ok(())
    }

    /// `http://host:port`
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Per-server state directory name, so several servers never collide
    pub fn dir_name(&self) -> String {
        format!("{}-{}", self.host.replace(['/', '\\', ':'], "_"), self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Notification settings
///
/// Messages are sent from `sender` to `email_recipient` (full report) and/or
/// `sms_address` (summary through an email-to-SMS gateway).
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub sender: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    pub email_recipient: Option<String>,
    pub sms_address: Option<String>,
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for NotifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyConfig")
            .field("sender", &self.sender)
            .field("password", &self.password.as_ref().map(|_| "<REDACTED>"))
            .field("email_recipient", &self.email_recipient)
            .field("sms_address", &self.sms_address)
            .finish()
    }
}

impl NotifyConfig {
    /// Whether notifications are configured at all
    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Validate the notification configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match &self.sender {
            Some(sender) => {
                check_address("sender", sender)?;
                if self.password.as_deref().is_none_or(str::is_empty) {
                    return Err(crate::Error::config(format!(
                        "A password is required to log in to the {} account",
                        sender
                    )));
                }
                if self.email_recipient.is_none() && self.sms_address.is_none() {
                    return Err(crate::Error::config(
                        "A sender needs an email recipient and/or an SMS address",
                    ));
                }
            }
            None => {
                if self.email_recipient.is_some() {
                    return Err(crate::Error::config("An email recipient needs a sender"));
                }
                if self.sms_address.is_some() {
                    return Err(crate::Error::config("An SMS address needs a sender"));
                }
            }
        }

        if let Some(recipient) = &self.email_recipient {
            check_address("email recipient", recipient)?;
        }
        if let Some(sms) = &self.sms_address {
            check_address("SMS address", sms)?;
        }

        Ok(())
    }

    /// Configured destinations with their kind
    pub fn destinations(&self) -> Vec<(DestinationKind, &str)> {
        let mut out = Vec::new();
        if let Some(recipient) = &self.email_recipient {
            out.push((DestinationKind::Email, recipient.as_str()));
        }
        if let Some(sms) = &self.sms_address {
            out.push((DestinationKind::Sms, sms.as_str()));
        }
        out
    }
}

/// Kind of message a destination receives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationKind {
    /// Full report
    Email,
    /// Condensed summary
    Sms,
}

fn check_address(what: &str, address: &str) -> Result<(), crate::Error> {
    match address.split_once('@') {
        Some((user, domain)) if !user.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(crate::Error::config(format!(
            "Invalid {} address: {}",
            what, address
        ))),
    }
}

/// Change log configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    /// Start a new change log file every year
    #[serde(default)]
    pub per_year: bool,
}

fn default_frequency_minutes() -> u64 {
    30
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8089
}
