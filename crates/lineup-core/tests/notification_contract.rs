//! Contract Test: Notification Delivery
//!
//! Verifies how reports reach their destinations:
//! - Email gets the detailed report, SMS gets the summary
//! - Nothing is sent when nothing changed
//! - A failing notifier never prevents snapshots from being written
//! - An offline server is reported once per destination and stops the engine

mod common;

use std::time::Duration;

use common::*;
use lineup_core::engine::{EMAIL_SUBJECT, OFFLINE_SUBJECT, TEXT_SUBJECT};
use lineup_core::{FileSnapshotStore, MonitorEngine, MonitorEvent, SnapshotStore};
use tempfile::tempdir;
use tokio::sync::oneshot;

#[tokio::test]
async fn email_gets_report_and_sms_gets_summary() {
    let dir = tempdir().unwrap();
    let config = config_with_notify(dir.path());
    let store = FileSnapshotStore::new(config.server_dir()).await.unwrap();
    let server = ScriptedServer::new()
        .then_sources(vec![source("Antenna Tuner", &[("7", "KGO")])]);
    let notifier = RecordingNotifier::new();

    let (mut engine, _events) = MonitorEngine::new(
        Box::new(server),
        Some(Box::new(notifier.clone())),
        Box::new(store),
        config,
    )
    .unwrap();

    let outcome = engine.run_cycle().await.unwrap();
    assert_eq!(outcome.notifications_sent, 2);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 2);

    let email = sent.iter().find(|m| m.destination == EMAIL_TO).unwrap();
    assert_eq!(email.subject, EMAIL_SUBJECT);
    assert_eq!(email.body, outcome.report);
    assert!(email.body.contains("Channels DVR server: http://127.0.0.1:8089"));

    let sms = sent.iter().find(|m| m.destination == SMS_TO).unwrap();
    assert_eq!(sms.subject, TEXT_SUBJECT);
    assert_eq!(sms.body, "Antenna: new, 1");
}

#[tokio::test]
async fn no_changes_sends_nothing() {
    let dir = tempdir().unwrap();
    let config = config_with_notify(dir.path());
    let store = FileSnapshotStore::new(config.server_dir()).await.unwrap();
    let lineup = [("1", "A"), ("2", "B")];
    let server = ScriptedServer::new()
        .then_sources(vec![source("Tuner", &lineup)])
        .then_sources(vec![source("Tuner", &lineup)]);
    let notifier = RecordingNotifier::new();

    let (mut engine, _events) = MonitorEngine::new(
        Box::new(server),
        Some(Box::new(notifier.clone())),
        Box::new(store),
        config,
    )
    .unwrap();

    engine.run_cycle().await.unwrap();
    let attempts_after_first = notifier.attempts();

    let outcome = engine.run_cycle().await.unwrap();
    assert!(!outcome.result.has_changes());
    assert_eq!(outcome.notifications_sent, 0);
    assert_eq!(notifier.attempts(), attempts_after_first);
}

#[tokio::test]
async fn failed_notification_still_persists_snapshots() {
    let dir = tempdir().unwrap();
    let config = config_with_notify(dir.path());
    let store = FileSnapshotStore::new(config.server_dir()).await.unwrap();
    let server = ScriptedServer::new()
        .then_sources(vec![source("Tuner", &[("1", "A")])])
        .then_sources(vec![source("Tuner", &[("1", "A"), ("2", "B")])]);
    let notifier = RecordingNotifier::failing();

    let (mut engine, mut events) = MonitorEngine::new(
        Box::new(server),
        Some(Box::new(notifier.clone())),
        Box::new(store.clone()),
        config,
    )
    .unwrap();

    engine.run_cycle().await.unwrap();
    let outcome = engine.run_cycle().await.unwrap();

    assert_eq!(outcome.notifications_sent, 0);
    assert_eq!(outcome.notifications_failed, 2);
    assert_eq!(notifier.attempts(), 4);
    assert_eq!(store.load("Tuner").await.unwrap().len(), 2);

    let mut failures = 0;
    while let Ok(event) = events.try_recv() {
        if let MonitorEvent::NotificationFailed { error, .. } = event {
            assert!(error.contains("535"));
            failures += 1;
        }
    }
    assert_eq!(failures, 4);
}

#[tokio::test]
async fn offline_server_notifies_once_and_stops() {
    let dir = tempdir().unwrap();
    let config = config_with_notify(dir.path());
    let store = FileSnapshotStore::new(config.server_dir()).await.unwrap();
    let server = ScriptedServer::new()
        .then_sources(vec![source("Tuner", &[("1", "A")])])
        .then_offline()
        .then_sources(vec![source("Tuner", &[("1", "A")])]);
    let notifier = RecordingNotifier::new();

    let (engine, mut events) = MonitorEngine::new(
        Box::new(server.clone()),
        Some(Box::new(notifier.clone())),
        Box::new(store),
        config,
    )
    .unwrap();
    let mut engine = engine.with_poll_interval(Duration::from_millis(10));

    let (_shutdown_tx, shutdown_rx) = oneshot::channel();
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        engine.run_with_shutdown(shutdown_rx),
    )
    .await
    .expect("engine stops on its own");

    let err = result.unwrap_err();
    assert!(err.is_offline());
    assert_eq!(server.fetch_count(), 2);

    let offline: Vec<_> = notifier
        .sent()
        .into_iter()
        .filter(|m| m.subject == OFFLINE_SUBJECT)
        .collect();
    assert_eq!(offline.len(), 2);
    assert!(offline.iter().any(|m| m.destination == EMAIL_TO));
    assert!(offline.iter().any(|m| m.destination == SMS_TO));
    assert!(offline[0].body.contains("http://127.0.0.1:8089"));

    let mut saw_offline = false;
    let mut last = None;
    while let Ok(event) = events.try_recv() {
        if matches!(event, MonitorEvent::ServerOffline { .. }) {
            saw_offline = true;
        }
        last = Some(event);
    }
    assert!(saw_offline);
    assert_eq!(
        last,
        Some(MonitorEvent::Stopped {
            reason: "Server offline".to_string()
        })
    );
}

#[tokio::test]
async fn shutdown_signal_stops_cleanly() {
    let dir = tempdir().unwrap();
    let config = config_log_only(dir.path());
    let store = FileSnapshotStore::new(config.server_dir()).await.unwrap();
    let server = ScriptedServer::new().then_sources(vec![source("Tuner", &[("1", "A")])]);

    let (engine, _events) =
        MonitorEngine::new(Box::new(server.clone()), None, Box::new(store), config).unwrap();
    // Long enough that the second fetch (which would fail) never happens
    let mut engine = engine.with_poll_interval(Duration::from_secs(3600));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = tokio::spawn(async move { engine.run_with_shutdown(shutdown_rx).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("engine honours shutdown")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(server.fetch_count(), 1);
}
