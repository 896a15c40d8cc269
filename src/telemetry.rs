//! Tracing and metrics bootstrap.
//!
//! Deliberately scoped down from a full OpenTelemetry pipeline: this
//! crate only needs structured logs and a handful of counters/histograms,
//! not an exporter. `init_tracing` is single-flight via `std::sync::Once`
//! so repeated calls (e.g. from tests) are harmless.

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a global `tracing` subscriber reading `RUST_LOG` (defaulting
/// to `info`). Safe to call more than once per process.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .ok();
    });
}

/// Records a single play attempt for a game/result pair.
pub fn record_play(game_id: &str, won: bool) {
    metrics::counter!("chatterpoints_plays_total", "game" => game_id.to_string(), "won" => won.to_string())
        .increment(1);
}

/// Records one scheduler maintenance sweep outcome.
pub fn record_maintenance_sweep(closed_periods: usize, closed_cycles: usize, opened_periods: usize) {
    metrics::counter!("chatterpoints_maintenance_closed_periods_total").increment(closed_periods as u64);
    metrics::counter!("chatterpoints_maintenance_closed_cycles_total").increment(closed_cycles as u64);
    metrics::counter!("chatterpoints_maintenance_opened_periods_total").increment(opened_periods as u64);
}

/// Records one registered operation's awarded points.
pub fn record_operation_points(op_type: &str, points: i64) {
    metrics::histogram!("chatterpoints_operation_points", "type" => op_type.to_string())
        .record(points as f64);
}
