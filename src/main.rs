use std::process::ExitCode;
use std::sync::Arc;

use tracing::{info, warn};

use rentcore::config::Config;
use rentcore::engine::Engine;
use rentcore::model::format_ts;
use rentcore::notify::NotifyHub;

/// Replays the rental log, checks it, reports, and compacts when due.
#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    rentcore::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let wal_path = config.wal_path();
    info!("rentcore maintenance");
    info!("  wal: {}", wal_path.display());
    info!("  compact_threshold: {}", config.compact_threshold);

    let engine = Engine::new(wal_path, Arc::new(NotifyHub::new()))?;

    let report = engine.audit().await;
    for car_id in &report.status_drift {
        warn!("car {car_id}: status does not match its rentals");
    }
    for (a, b) in &report.overlapping {
        warn!("active rentals {a} and {b} overlap");
    }
    for rental in engine.list_overdue_rentals().await {
        warn!(
            "rental {} on car {} overdue since {}",
            rental.id(),
            rental.car_id(),
            format_ts(rental.planned_end_at())
        );
    }

    let summary = engine.fleet_summary().await;
    println!(
        "{}",
        serde_json::json!({ "audit": report, "fleet": summary })
    );

    let logged = engine.replayed_events() + engine.wal_appends_since_compact().await;
    if logged >= config.compact_threshold {
        engine.compact_wal().await?;
    }

    if report.is_clean() {
        info!("audit clean");
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
