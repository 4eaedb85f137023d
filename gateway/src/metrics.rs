//! Prometheus metrics for the gateway.
//!
//! [`GatewayMetrics`] owns its own [`Registry`] so several gateways (or
//! tests) in one process do not collide on metric names.

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, IntCounter, IntGauge,
    Opts, Registry,
};

pub struct GatewayMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Requests handed to a delegate.
    pub requests_routed: IntCounter,
    /// Requests rejected before reaching a delegate.
    pub routing_failures: IntCounter,
    pub scans: IntCounter,
    /// Scans dropped because another scan was still running.
    pub scans_skipped: IntCounter,
    pub confirmations: IntCounter,
    /// Failed confirmation queries; the work stays pending.
    pub transport_errors: IntCounter,
    pub callbacks_dispatched: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub pending_work: IntGauge,
    /// Receipts that arrived before any callback was registered.
    pub unclaimed_receipts: IntGauge,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_routed = register_int_counter_with_registry!(
            Opts::new(
                "xledger_requests_routed_total",
                "Requests dispatched to a delegate"
            ),
            registry
        )
        .expect("failed to register requests_routed counter");

        let routing_failures = register_int_counter_with_registry!(
            Opts::new(
                "xledger_routing_failures_total",
                "Requests rejected by principal resolution or delegate matching"
            ),
            registry
        )
        .expect("failed to register routing_failures counter");

        let scans = register_int_counter_with_registry!(
            Opts::new("xledger_scans_total", "Receipt scans run"),
            registry
        )
        .expect("failed to register scans counter");

        let scans_skipped = register_int_counter_with_registry!(
            Opts::new(
                "xledger_scans_skipped_total",
                "Receipt scans dropped because one was already running"
            ),
            registry
        )
        .expect("failed to register scans_skipped counter");

        let confirmations = register_int_counter_with_registry!(
            Opts::new(
                "xledger_confirmations_total",
                "Confirmations obtained from ledgers"
            ),
            registry
        )
        .expect("failed to register confirmations counter");

        let transport_errors = register_int_counter_with_registry!(
            Opts::new(
                "xledger_transport_errors_total",
                "Failed confirmation queries"
            ),
            registry
        )
        .expect("failed to register transport_errors counter");

        let callbacks_dispatched = register_int_counter_with_registry!(
            Opts::new(
                "xledger_callbacks_dispatched_total",
                "Receipt callbacks handed to the worker pool"
            ),
            registry
        )
        .expect("failed to register callbacks_dispatched counter");

        let pending_work = register_int_gauge_with_registry!(
            Opts::new("xledger_pending_work", "Submitted work awaiting confirmation"),
            registry
        )
        .expect("failed to register pending_work gauge");

        let unclaimed_receipts = register_int_gauge_with_registry!(
            Opts::new(
                "xledger_unclaimed_receipts",
                "Confirmations waiting for a callback"
            ),
            registry
        )
        .expect("failed to register unclaimed_receipts gauge");

        Self {
            registry,
            requests_routed,
            routing_failures,
            scans,
            scans_skipped,
            confirmations,
            transport_errors,
            callbacks_dispatched,
            pending_work,
            unclaimed_receipts,
        }
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}
