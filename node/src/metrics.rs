//! # Prometheus Metrics
//!
//! Operational metrics for the store service, scraped at `/metrics` on the
//! configured metrics port. Everything is registered in a dedicated
//! [`prometheus::Registry`] under the `chainstore` prefix.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    core::Collector, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry,
    TextEncoder,
};
use std::sync::Arc;

use chainstore_core::store::StoreInfo;

/// Metric handles for the service. Prometheus handles are `Arc`-backed, so
/// clones update the same series.
#[derive(Clone)]
pub struct StoreMetrics {
    registry: Registry,
    /// Blocks sealed and committed by this process.
    pub blocks_mined_total: IntCounter,
    /// Transactions carried by those blocks.
    pub transactions_sealed_total: IntCounter,
    /// Transactions waiting for the next block.
    pub pending_transactions: IntGauge,
    /// Blocks in the chain, genesis included.
    pub chain_length: IntGauge,
    /// Records rejected by schema validation.
    pub validation_failures_total: IntCounter,
    /// Wall-clock time spent in one `mine` call, proof-of-work included.
    pub mining_duration_seconds: Histogram,
}

fn register<C: Collector + Clone + 'static>(registry: &Registry, collector: C) -> C {
    registry
        .register(Box::new(collector.clone()))
        .expect("metric registration");
    collector
}

impl StoreMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("chainstore".into()), None)
            .expect("failed to create prometheus registry");

        let blocks_mined_total = register(
            &registry,
            IntCounter::new("blocks_mined_total", "Total number of blocks mined")
                .expect("metric creation"),
        );
        let transactions_sealed_total = register(
            &registry,
            IntCounter::new(
                "transactions_sealed_total",
                "Total number of transactions sealed into blocks",
            )
            .expect("metric creation"),
        );
        let pending_transactions = register(
            &registry,
            IntGauge::new(
                "pending_transactions",
                "Transactions waiting to be mined",
            )
            .expect("metric creation"),
        );
        let chain_length = register(
            &registry,
            IntGauge::new("chain_length", "Number of blocks in the chain, genesis included")
                .expect("metric creation"),
        );
        let validation_failures_total = register(
            &registry,
            IntCounter::new(
                "validation_failures_total",
                "Records rejected by schema validation",
            )
            .expect("metric creation"),
        );
        let mining_duration_seconds = register(
            &registry,
            Histogram::with_opts(
                HistogramOpts::new(
                    "mining_duration_seconds",
                    "Time to seal and commit one block, in seconds",
                )
                .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0]),
            )
            .expect("metric creation"),
        );

        Self {
            registry,
            blocks_mined_total,
            transactions_sealed_total,
            pending_transactions,
            chain_length,
            validation_failures_total,
            mining_duration_seconds,
        }
    }

    /// Refresh the gauges from a store status snapshot.
    pub fn observe_store(&self, info: &StoreInfo) {
        self.pending_transactions
            .set(info.ledger.pending_count as i64);
        self.chain_length.set(info.ledger.chain_length as i64);
    }

    /// Record one successful mine.
    pub fn observe_block(&self, transactions: usize, seconds: f64) {
        self.blocks_mined_total.inc();
        self.transactions_sealed_total.inc_by(transactions as u64);
        self.mining_duration_seconds.observe(seconds);
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for StoreMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics handle passed to axum handlers.
pub type SharedMetrics = Arc<StoreMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
