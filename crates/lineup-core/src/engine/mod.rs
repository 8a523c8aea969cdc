//! Core monitoring engine
//!
//! The MonitorEngine is responsible for:
//! - Fetching sources from the ChannelServer on a fixed period
//! - Reconciling them against the persisted snapshots
//! - Rendering and delivering change reports
//! - Persisting snapshots after every cycle
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐
//! │ ChannelServer │─── Vec<RawSource> ───┐
//! └───────────────┘                      │
//!                                        ▼
//!                               ┌─────────────────┐
//!                               │  MonitorEngine  │
//!                               └─────────────────┘
//!                                        │
//!         ┌──────────────────────────────┼──────────────────────────────┐
//!         │                              │                              │
//!         ▼                              ▼                              ▼
//! ┌─────────────────┐           ┌─────────────────┐           ┌─────────────────┐
//! │ FleetReconciler │           │ ReportFormatter │           │    Notifier     │
//! │ (+ snapshots)   │           │ (+ activity log)│           │  (email / SMS)  │
//! └─────────────────┘           └─────────────────┘           └─────────────────┘
//! ```
//!
//! ## Cycle
//!
//! 1. Fetch sources and server version (failure ends the run: server offline)
//! 2. Look up display URLs for monitored sources
//! 3. Reconcile
//! 4. If anything changed: append to the change log, notify
//! 5. Persist snapshots (even if notification failed)
//! 6. Overwrite the last-activity file

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Local;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::activity::ActivityLog;
use crate::config::{DestinationKind, MonitorConfig, NotifyConfig};
use crate::error::{Error, Result};
use crate::reconciler::{FleetReconciler, FleetReconciliationResult};
use crate::report::{ReportFormatter, ReportHeader};
use crate::traits::{ChannelServer, Notifier, SnapshotStore};

/// Subject of the detailed email report
pub const EMAIL_SUBJECT: &str = "Channels DVR: changes in channel lineups";

/// Subject of the SMS summary
pub const TEXT_SUBJECT: &str = "Channels";

/// Subject of the offline notice
pub const OFFLINE_SUBJECT: &str = "Channels DVR: server offline";

/// Capacity of the engine event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events emitted by the MonitorEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// Engine started
    Started { server_url: String },

    /// A cycle finished
    CycleCompleted {
        has_changes: bool,
        new_sources: usize,
        deleted_sources: usize,
    },

    /// A notification was delivered
    NotificationSent { destination: String },

    /// A notification could not be delivered
    NotificationFailed { destination: String, error: String },

    /// The server could not be reached; the engine stops
    ServerOffline { error: String },

    /// Engine stopped
    Stopped { reason: String },
}

/// What one cycle did
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub result: FleetReconciliationResult,
    /// Detailed report (empty when nothing changed)
    pub report: String,
    /// Condensed summary (empty when nothing changed)
    pub summary: String,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    pub snapshots_written: usize,
}

impl CycleOutcome {
    fn describe(&self) -> String {
        if !self.result.has_changes() {
            return "No changes found.".to_string();
        }
        let mut text = format!("Changes found.\n\n{}", self.report.trim_end());
        if self.notifications_sent + self.notifications_failed > 0 {
            text.push_str(&format!(
                "\n\nNotifications: {} sent, {} failed",
                self.notifications_sent, self.notifications_failed
            ));
        }
        text
    }
}

/// Core lineup monitoring engine
///
/// ## Lifecycle
///
/// 1. Create with [`MonitorEngine::new()`]
/// 2. Start with [`MonitorEngine::run()`]
/// 3. Engine runs until a shutdown signal or until the server goes offline
///
/// ## Threading
///
/// Every step of a cycle is awaited in sequence; there is never more than one
/// cycle in flight.
pub struct MonitorEngine {
    /// Server being monitored
    server: Box<dyn ChannelServer>,

    /// Delivery of reports, when configured
    notifier: Option<Box<dyn Notifier>>,

    /// Per-source state and snapshots
    reconciler: FleetReconciler,

    /// Change log and last-activity file
    activity: ActivityLog,

    /// Where reports go
    notify: NotifyConfig,

    /// Time between cycles
    poll_interval: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<MonitorEvent>,
}

impl MonitorEngine {
    /// Create a new monitoring engine
    ///
    /// # Parameters
    ///
    /// - `server`: Channel server implementation
    /// - `notifier`: Notifier, or `None` for log-only monitoring
    /// - `store`: Snapshot store for the configured server
    /// - `config`: Monitor configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        server: Box<dyn ChannelServer>,
        notifier: Option<Box<dyn Notifier>>,
        store: Box<dyn SnapshotStore>,
        config: MonitorConfig,
    ) -> Result<(Self, mpsc::Receiver<MonitorEvent>)> {
        config.validate()?;

        if config.notify.is_enabled() && notifier.is_none() {
            warn!("Notification destinations configured but no notifier provided");
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let engine = Self {
            server,
            notifier,
            reconciler: FleetReconciler::new(store),
            activity: ActivityLog::new(config.server_dir(), config.log.per_year),
            poll_interval: config.poll_interval(),
            notify: config.notify,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Override the period between cycles
    ///
    /// Bypasses the configured minimum; meant for tests and one-shot tools.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Reconciler state (for inspection)
    pub fn reconciler(&self) -> &FleetReconciler {
        &self.reconciler
    }

    /// Run the engine until SIGINT or until the server goes offline
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error::ServerOffline)`: The server stopped answering
    pub async fn run(&mut self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the engine with a controlled shutdown signal
    ///
    /// The loop stops between cycles once `shutdown_rx` resolves.
    pub async fn run_with_shutdown(&mut self, shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
        self.run_internal(Some(shutdown_rx)).await
    }

    async fn run_internal(&mut self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.emit_event(MonitorEvent::Started {
            server_url: self.server.base_url(),
        });
        info!(
            "Monitoring {} every {:?}",
            self.server.base_url(),
            self.poll_interval
        );

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        };
        tokio::pin!(shutdown);

        loop {
            match self.run_cycle().await {
                Ok(outcome) => {
                    debug!(
                        "Cycle done: changes={}, snapshots={}",
                        outcome.result.has_changes(),
                        outcome.snapshots_written
                    );
                }
                Err(e) if e.is_offline() => {
                    error!("Server {} is offline: {}", self.server.base_url(), e);
                    self.notify_offline(&e).await;
                    self.emit_event(MonitorEvent::ServerOffline {
                        error: e.to_string(),
                    });
                    self.emit_event(MonitorEvent::Stopped {
                        reason: "Server offline".to_string(),
                    });
                    return Err(e);
                }
                Err(e) => {
                    // Snapshot or log I/O trouble: keep monitoring
                    error!("Cycle failed: {}", e);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(MonitorEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        Ok(())
    }

    /// Run a single poll-reconcile-report-persist cycle
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let sources = self.server.fetch_sources().await?;
        let version = self.server.server_version().await?;

        let mut source_urls = BTreeMap::new();
        for source in sources.iter().filter(|s| s.is_monitored()) {
            if let Some(url) = self.server.source_url(source).await {
                source_urls.insert(source.name.clone(), url);
            }
        }

        let result = self.reconciler.reconcile(&sources, &source_urls).await?;

        let formatter =
            ReportFormatter::new(ReportHeader::new(self.server.base_url(), Some(version)));
        let report = formatter.detailed(&result);
        let summary = formatter.summary(&result);

        let now = Local::now();
        let mut outcome = CycleOutcome {
            result,
            report,
            summary,
            notifications_sent: 0,
            notifications_failed: 0,
            snapshots_written: 0,
        };

        if outcome.result.has_changes() {
            info!("Channel lineup changes detected\n{}", outcome.report);
            if let Err(e) = self.activity.append_changes(&now, &outcome.report).await {
                warn!("Failed to write change log: {}", e);
            }
            self.deliver(&mut outcome).await;
        } else {
            info!("No channel lineup changes");
        }

        outcome.snapshots_written = self.reconciler.persist().await?;

        if let Err(e) = self.activity.write_last_activity(&now, &outcome.describe()).await {
            warn!("Failed to write last activity: {}", e);
        }

        self.emit_event(MonitorEvent::CycleCompleted {
            has_changes: outcome.result.has_changes(),
            new_sources: outcome.result.new_sources.len(),
            deleted_sources: outcome.result.deleted_sources.len(),
        });

        Ok(outcome)
    }

    /// Send the report and summary to every configured destination
    async fn deliver(&self, outcome: &mut CycleOutcome) {
        let Some(notifier) = &self.notifier else {
            return;
        };

        for (kind, destination) in self.notify.destinations() {
            let (subject, body) = match kind {
                DestinationKind::Email => (EMAIL_SUBJECT, outcome.report.as_str()),
                DestinationKind::Sms => (TEXT_SUBJECT, outcome.summary.as_str()),
            };

            match self.send(notifier.as_ref(), destination, subject, body).await {
                Ok(()) => outcome.notifications_sent += 1,
                Err(_) => outcome.notifications_failed += 1,
            }
        }
    }

    /// Tell every destination the server stopped answering
    async fn notify_offline(&self, error: &Error) {
        let Some(notifier) = &self.notifier else {
            return;
        };

        let body = format!(
            "The Channels DVR server at {} is not responding.\n\n{}\n\nMonitoring has stopped.",
            self.server.base_url(),
            error
        );
        for (_, destination) in self.notify.destinations() {
            let _ = self
                .send(notifier.as_ref(), destination, OFFLINE_SUBJECT, &body)
                .await;
        }
    }

    async fn send(
        &self,
        notifier: &dyn Notifier,
        destination: &str,
        subject: &str,
        body: &str,
    ) -> Result<()> {
        info!("Sending {:?} to {} via {}", subject, destination, notifier.notifier_name());
        match notifier.send(destination, subject, body).await {
            Ok(()) => {
                self.emit_event(MonitorEvent::NotificationSent {
                    destination: destination.to_string(),
                });
                Ok(())
            }
            Err(e) => {
                error!("Failed to notify {}: {}", destination, e);
                self.emit_event(MonitorEvent::NotificationFailed {
                    destination: destination.to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: MonitorEvent) {
        // Nobody listening or channel full: monitoring continues regardless
        if self.event_tx.try_send(event).is_err() {
            debug!("Event channel full or closed, dropping event");
        }
    }
}
