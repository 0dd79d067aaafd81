use std::net::SocketAddr;

use metrics_exporter_prometheus::BuildError;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: reschedule attempts. Labels: outcome (applied, declined, failed).
pub const RESCHEDULES_TOTAL: &str = "slotboard_reschedules_total";

/// Counter: snapshot refreshes. Labels: status (ok, error).
pub const SNAPSHOT_REFRESH_TOTAL: &str = "slotboard_snapshot_refresh_total";

/// Histogram: time to load a snapshot from the collaborators, in seconds.
pub const SNAPSHOT_REFRESH_DURATION_SECONDS: &str = "slotboard_snapshot_refresh_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: meetings in the most recent snapshot.
pub const SNAPSHOT_MEETINGS: &str = "slotboard_snapshot_meetings";

/// Gauge: organizational contexts held by the registry.
pub const CONTEXTS_ACTIVE: &str = "slotboard_contexts_active";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Install the fmt subscriber, honoring `RUST_LOG`. A second call is a no-op.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}
