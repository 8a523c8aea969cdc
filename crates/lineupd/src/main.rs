// # lineupd - Channel Lineup Monitor Daemon
//
// The lineupd daemon is a thin integration layer over lineup-core. It is
// responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Building the HTTP channel server, snapshot store and SMTP notifier
// 4. Running the monitor engine until a signal or until the server goes offline
//
// ## Configuration
//
// ### Server
// - `LINEUP_SERVER_HOST`: Channels DVR host (default 127.0.0.1)
// - `LINEUP_SERVER_PORT`: Channels DVR port (default 8089)
// - `LINEUP_FREQUENCY_MINUTES`: Minutes between checks (default 30, minimum 5)
//
// ### Storage
// - `LINEUP_DATA_DIR`: Root of snapshots and logs (default ./data)
// - `LINEUP_LOG_PER_YEAR`: Start a new change log every year (true/false)
// - `LINEUP_STRICT_SNAPSHOTS`: Fail on malformed snapshot lines (true/false)
//
// ### Notifications
// - `LINEUP_EMAIL_SENDER`: gmail, outlook or yahoo account sending the reports
// - `LINEUP_EMAIL_PASSWORD`: Password (or app password) of the sender
// - `LINEUP_EMAIL_RECIPIENT`: Receives the detailed report
// - `LINEUP_SMS_ADDRESS`: Receives the summary (`<number>@<carrier gateway>`)
//
// ### Logging
// - `LINEUP_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export LINEUP_SERVER_HOST=192.168.1.20
// export LINEUP_EMAIL_SENDER=me@gmail.com
// export LINEUP_EMAIL_PASSWORD=app_password
// export LINEUP_SMS_ADDRESS=5551234567@vtext.com
//
// lineupd
// ```

use anyhow::{Context, Result};
use lineup_core::config::{LogConfig, MonitorConfig, NotifyConfig, ServerConfig};
use lineup_core::{FileSnapshotStore, MonitorEngine, MonitorEvent, Notifier};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::{mpsc, oneshot};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (server offline, unexpected failure)
#[derive(Debug, Clone, Copy)]
enum LineupExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<LineupExitCode> for ExitCode {
    fn from(code: LineupExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    monitor: MonitorConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = MonitorConfig::default();

        let port = match var("LINEUP_SERVER_PORT") {
            Some(port) => port
                .trim()
                .parse()
                .with_context(|| format!("LINEUP_SERVER_PORT '{}' is not a port number", port))?,
            None => defaults.server.port,
        };

        let frequency_minutes = match var("LINEUP_FREQUENCY_MINUTES") {
            Some(minutes) => minutes.trim().parse().with_context(|| {
                format!("LINEUP_FREQUENCY_MINUTES '{}' is not a number", minutes)
            })?,
            None => defaults.frequency_minutes,
        };

        let monitor = MonitorConfig {
            server: ServerConfig::new(
                var("LINEUP_SERVER_HOST").unwrap_or(defaults.server.host),
                port,
            ),
            frequency_minutes,
            data_dir: var("LINEUP_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            notify: NotifyConfig {
                sender: var("LINEUP_EMAIL_SENDER"),
                password: var("LINEUP_EMAIL_PASSWORD"),
                email_recipient: var("LINEUP_EMAIL_RECIPIENT"),
                sms_address: var("LINEUP_SMS_ADDRESS"),
            },
            log: LogConfig {
                per_year: parse_bool("LINEUP_LOG_PER_YEAR", var("LINEUP_LOG_PER_YEAR"))?,
            },
            strict_snapshots: parse_bool(
                "LINEUP_STRICT_SNAPSHOTS",
                var("LINEUP_STRICT_SNAPSHOTS"),
            )?,
        };

        Ok(Self {
            monitor,
            log_level: var("LINEUP_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.monitor.validate()?;

        if let Some(sender) = &self.monitor.notify.sender {
            #[cfg(feature = "smtp")]
            if lineup_notify_smtp::smtp_relay(sender).is_none() {
                anyhow::bail!(
                    "LINEUP_EMAIL_SENDER '{}' is not supported. \
                    Supported providers: gmail, outlook, yahoo",
                    sender
                );
            }

            #[cfg(not(feature = "smtp"))]
            anyhow::bail!(
                "LINEUP_EMAIL_SENDER '{}' is set but lineupd was built without SMTP support",
                sender
            );
        }

        // Validate log level
        parse_level(&self.log_level)?;

        Ok(())
    }
}

fn parse_bool(key: &str, value: Option<String>) -> Result<bool> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("{} '{}' is not a boolean (true/false)", key, other),
    }
}

fn parse_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "LINEUP_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return LineupExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return LineupExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = parse_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return LineupExitCode::ConfigError.into();
    }

    info!("Starting lineupd daemon");
    info!(
        "Monitoring {} every {} minutes, data in {}",
        config.monitor.server.base_url(),
        config.monitor.frequency_minutes,
        config.monitor.server_dir().display()
    );

    // One cycle at a time: a single-threaded runtime is enough
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return LineupExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        let engine = match build_engine(config.monitor).await {
            Ok(engine) => engine,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return LineupExitCode::ConfigError;
            }
        };

        if let Err(e) = run_daemon(engine).await {
            error!("Daemon error: {:#}", e);
            LineupExitCode::RuntimeError
        } else {
            LineupExitCode::CleanShutdown
        }
    })
    .into()
}

/// Build the engine and its collaborators from the configuration
async fn build_engine(config: MonitorConfig) -> Result<(MonitorEngine, mpsc::Receiver<MonitorEvent>)> {
    let store = FileSnapshotStore::new(config.server_dir())
        .await
        .context("Failed to open snapshot directory")?
        .with_strict(config.strict_snapshots);

    let notifier = build_notifier(&config.notify)?;
    if notifier.is_none() {
        warn!("No email sender configured, changes will only be logged");
    }

    #[cfg(feature = "http")]
    let server = Box::new(lineup_server_http::HttpChannelServer::new(&config.server));

    #[cfg(not(feature = "http"))]
    let server: Box<dyn lineup_core::ChannelServer> =
        anyhow::bail!("lineupd was built without HTTP support");

    let (engine, events) = MonitorEngine::new(server, notifier, Box::new(store), config)?;
    Ok((engine, events))
}

#[cfg(feature = "smtp")]
fn build_notifier(config: &NotifyConfig) -> Result<Option<Box<dyn Notifier>>> {
    let notifier = lineup_notify_smtp::SmtpNotifier::from_config(config)?;
    Ok(notifier.map(|n| {
        info!("Notifications via {}", n.relay());
        Box::new(n) as Box<dyn Notifier>
    }))
}

#[cfg(not(feature = "smtp"))]
fn build_notifier(_config: &NotifyConfig) -> Result<Option<Box<dyn Notifier>>> {
    Ok(None)
}

/// Run the engine until a shutdown signal or a fatal error
async fn run_daemon(
    (mut engine, mut events): (MonitorEngine, mpsc::Receiver<MonitorEvent>),
) -> Result<()> {
    // Surface engine events in the log
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Engine event: {:?}", event);
        }
    });

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Signal handling error: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    engine.run_with_shutdown(shutdown_rx).await?;
    info!("Shutting down daemon");
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
