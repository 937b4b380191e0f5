//! Observability infrastructure - Tracing and Metrics

mod config;
mod metrics;
mod tracing_setup;

pub use config::{MetricsConfig, ObservabilityConfig, TracingConfig};
pub use metrics::{
    init_metrics, record_answer, record_cache_lookup, record_items_surfaced,
    record_retrieval_degraded, AnswerMetricParams, CacheLookup,
};
pub use tracing_setup::{init_tracing, shutdown_tracing};
