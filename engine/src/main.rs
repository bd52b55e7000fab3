// Trend navigator entry point
use anyhow::Context;
use clap::Parser;
use engine::config::EngineSettings;
use engine::data::HttpTransport;
use engine::services::{AlertSink, CsvSignalLog, LogAlertSink, Scanner, TelegramAlertSink};
use shared::models::TimeFrame;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// KNN trend-line scanner. Settings come from `TN_*` environment variables;
/// flags given here take precedence.
#[derive(Parser, Debug)]
#[command(name = "trend-navigator", version, about)]
struct Cli {
    /// Run a single scan cycle and exit
    #[arg(long)]
    once: bool,

    /// Log alerts instead of sending them to the chat
    #[arg(long)]
    dry_run: bool,

    /// Candle timeframe, e.g. 5m, 1h
    #[arg(long)]
    timeframe: Option<TimeFrame>,

    /// Path of the CSV signal log
    #[arg(long, conflicts_with = "no_signal_log")]
    signal_log: Option<PathBuf>,

    /// Disable the CSV signal log
    #[arg(long)]
    no_signal_log: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let mut settings = EngineSettings::from_env().context("loading settings from environment")?;
    if let Some(timeframe) = cli.timeframe {
        settings.timeframe = timeframe;
    }
    if let Some(path) = cli.signal_log {
        settings.signal_log_path = Some(path);
    }
    if cli.no_signal_log {
        settings.signal_log_path = None;
    }
    settings.validate().context("invalid settings")?;

    info!(
        exchange = ?settings.exchange,
        timeframe = %settings.timeframe,
        endpoints = settings.endpoints.len(),
        smoothing = settings.effective_smoothing_len(),
        "Starting trend navigator"
    );

    let transport =
        Arc::new(HttpTransport::new(settings.request_timeout()).context("building HTTP client")?);

    let alerts: Arc<dyn AlertSink> = match settings.alert_credentials() {
        Some((token, chat_id)) if !cli.dry_run => Arc::new(
            TelegramAlertSink::new(
                token,
                chat_id,
                settings.request_timeout(),
                Duration::from_millis(settings.delivery_pause_ms),
            )
            .context("building Telegram client")?,
        ),
        _ => {
            if !cli.dry_run {
                warn!("BOT_TOKEN / CHAT_ID not configured; alerts will be logged only");
            }
            Arc::new(LogAlertSink)
        }
    };

    let signal_log = match &settings.signal_log_path {
        Some(path) => Some(
            CsvSignalLog::open(path)
                .with_context(|| format!("opening signal log {}", path.display()))?,
        ),
        None => None,
    };

    let scanner =
        Scanner::new(settings, transport, alerts, signal_log).context("building scanner")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    scanner.run(shutdown_rx, cli.once).await;
    info!("Trend navigator stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
