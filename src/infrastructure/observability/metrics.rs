//! Prometheus metrics for the answer pipeline
//!
//! Every helper goes through the `metrics` facade and is a no-op until a
//! recorder is installed.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use super::config::MetricsConfig;
use crate::domain::routing::ModelTier;

/// Install the Prometheus recorder with its own scrape listener
///
/// Returns `false` when metrics are disabled or the exporter could not start.
pub fn init_metrics(config: &MetricsConfig) -> bool {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return false;
    }

    let addr: SocketAddr = match config.listen_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(addr = %config.listen_addr, "Invalid metrics listen address: {}", e);
            return false;
        }
    };

    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            gauge!("rag_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
            tracing::info!("Prometheus metrics listening on {}", addr);
            true
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            false
        }
    }
}

/// Outcome of a cache lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    Hit,
    Miss,
    Error,
}

impl CacheLookup {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Error => "error",
        }
    }
}

pub fn record_cache_lookup(cache: &'static str, result: CacheLookup) {
    counter!("rag_cache_lookups_total", "cache" => cache, "result" => result.as_str())
        .increment(1);
}

/// One answered (or failed) request
pub struct AnswerMetricParams {
    pub tier: Option<ModelTier>,
    pub cached: bool,
    pub success: bool,
    pub duration: Duration,
}

pub fn record_answer(params: AnswerMetricParams) {
    let labels = [
        ("tier", params.tier.map_or("none", |t| t.as_str()).to_string()),
        ("cached", params.cached.to_string()),
        ("status", if params.success { "success" } else { "error" }.to_string()),
    ];

    counter!("rag_answers_total", &labels).increment(1);
    histogram!("rag_answer_duration_seconds", &labels).record(params.duration.as_secs_f64());
}

pub fn record_retrieval_degraded(index: &'static str) {
    counter!("rag_retrieval_degraded_total", "index" => index).increment(1);
}

pub fn record_items_surfaced(count: usize) {
    counter!("rag_items_surfaced_total").increment(count as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_metrics_install_nothing() {
        assert!(!init_metrics(&MetricsConfig::default()));
    }

    #[test]
    fn test_invalid_listen_addr() {
        let config = MetricsConfig {
            enabled: true,
            listen_addr: "not an address".to_string(),
        };

        assert!(!init_metrics(&config));
    }

    #[test]
    fn test_helpers_without_recorder_are_noops() {
        record_cache_lookup("semantic", CacheLookup::Hit);
        record_retrieval_degraded("vector");
        record_items_surfaced(3);
        record_answer(AnswerMetricParams {
            tier: Some(ModelTier::Simple),
            cached: false,
            success: true,
            duration: Duration::from_millis(20),
        });
    }
}
