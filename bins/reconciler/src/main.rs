//! Moobaan reconciler
//!
//! Matches open pay-in claims against unmatched bank credits once and
//! exits. Intended to run from cron after each statement import.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use moobaan_core::{BillingService, ReconciliationSettings, SystemClock};
use moobaan_db::{PgStore, connect_with};
use moobaan_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json");
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "reconciler=info,moobaan_core=info,moobaan_db=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let config = AppConfig::load().context("Failed to load configuration")?;
    let settings = ReconciliationSettings::from_config(&config);

    let db = connect_with(&config.database).await?;
    info!("Connected to database");

    let service = BillingService::new(PgStore::new(db), SystemClock, settings);
    let report = service.run_automatic_match().await?;

    info!(
        matched = report.matched.len(),
        unmatched = report.unmatched_pay_ins.len(),
        tolerance_secs = settings.tolerance.num_seconds(),
        "reconciliation pass finished"
    );
    for proposal in &report.matched {
        info!(
            pay_in_id = %proposal.pay_in_id,
            bank_transaction_id = %proposal.bank_transaction_id,
            time_difference_secs = proposal.time_difference.num_seconds(),
            "matched"
        );
    }

    Ok(())
}
