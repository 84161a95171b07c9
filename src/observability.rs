use std::net::SocketAddr;

// ── Rental lifecycle ────────────────────────────────────────────

/// Counter: committed lifecycle operations. Labels: op.
pub const RENTAL_TRANSITIONS_TOTAL: &str = "rentcore_rental_transitions_total";

/// Counter: lifecycle operations refused before any write. Labels: op.
pub const RENTAL_REJECTIONS_TOTAL: &str = "rentcore_rental_rejections_total";

/// Histogram: base price of newly created rentals. Labels: rate_type.
pub const QUOTED_PRICE: &str = "rentcore_quoted_price";

/// Counter: cars found by an audit with status out of line with their rentals.
pub const STATUS_DRIFT_TOTAL: &str = "rentcore_status_drift_total";

// ── Storage ─────────────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "rentcore_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "rentcore_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
