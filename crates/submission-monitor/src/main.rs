mod bootstrap;

use std::sync::Arc;

use anyhow::{Context, Result};
use monitor_core::ledger::Ledger;
use monitor_core::notifications::{LogNotifier, Notifier};
use monitor_core::settings::{MonitorConfig, Settings};
use monitor_data::credentials::Credentials;
use monitor_data::kaggle::KaggleClient;
use monitor_data::webhook::WebhookNotifier;
use monitor_runtime::supervisor::Supervisor;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load();
    let ledger_path = settings.ledger_path();

    bootstrap::ensure_directories(&Settings::state_dir(), &ledger_path)?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_deref())?;

    tracing::info!("submission-monitor v{} starting", env!("CARGO_PKG_VERSION"));

    let config = MonitorConfig::from(&settings);
    tracing::info!(
        competition = %config.competition,
        interval_secs = config.api_request_interval.as_secs(),
        error_wait_secs = config.error_wait_time.as_secs(),
        timezone = %config.display_zone.tz(),
        "monitor configured"
    );

    let ledger = Ledger::open(&ledger_path)
        .with_context(|| format!("loading ledger {}", ledger_path.display()))?;
    tracing::info!(
        path = %ledger.path().display(),
        recorded = ledger.len(),
        "ledger loaded"
    );

    let credentials = Credentials::discover(settings.kaggle_config.as_deref())
        .context("Kaggle API authentication failed")?;
    tracing::info!(username = %credentials.username, "Kaggle API authentication succeeded");
    let source = KaggleClient::new(credentials)?;

    let notifier: Arc<dyn Notifier> = match settings.webhook_url.as_deref() {
        Some(url) => Arc::new(WebhookNotifier::new(url)?),
        None => {
            tracing::warn!("no webhook URL configured; notifications go to the log only");
            Arc::new(LogNotifier)
        }
    };

    let supervisor = Supervisor::new(config, Arc::new(source), notifier, Arc::new(ledger));
    supervisor
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            tracing::info!("Ctrl+C received; stopping monitoring");
        })
        .await;

    Ok(())
}
