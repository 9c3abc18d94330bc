use tracing::trace;

// Trace-level counters under `catalog.metrics`; enable with
// RUST_LOG=catalog.metrics=trace.

pub fn inc_requests(route: &'static str) {
    trace!(
        target = "catalog.metrics",
        route = route,
        "requests_total_inc"
    );
}

pub fn pass_elapsed(outcome: &'static str, elapsed_ms: u128) {
    trace!(
        target = "catalog.metrics",
        outcome = outcome,
        elapsed_ms = elapsed_ms as u64,
        "sync_pass_elapsed"
    );
}

pub fn records_fetched(count: usize) {
    trace!(
        target = "catalog.metrics",
        count = count as u64,
        "registry_records_fetched"
    );
}
