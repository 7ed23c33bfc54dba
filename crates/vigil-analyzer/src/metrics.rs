use prometheus::{Histogram, HistogramOpts, Registry};

use vigil_core::constants::LATENCY_BUCKETS_MS;
use vigil_core::error::VigilError;

fn metrics_err(e: prometheus::Error) -> VigilError {
    VigilError::Internal(format!("metrics registration failed: {e}"))
}

/// Analyzer latency histograms, in milliseconds.
///
/// Owned by the application context rather than a process-global registry so
/// tests can build as many as they like.
pub struct AnalyzerMetrics {
    pub registry: Registry,
    pub runtime_ms: Histogram,
    pub enqueue_ms: Histogram,
}

impl AnalyzerMetrics {
    pub fn new() -> Result<Self, VigilError> {
        let registry = Registry::new();
        let runtime_ms = Histogram::with_opts(
            HistogramOpts::new("analyzer_runtime_ms", "Analyzer job runtime")
                .buckets(LATENCY_BUCKETS_MS.to_vec()),
        )
        .map_err(metrics_err)?;
        let enqueue_ms = Histogram::with_opts(
            HistogramOpts::new("analyzer_enqueue_ms", "Queue wait before a job is picked up")
                .buckets(LATENCY_BUCKETS_MS.to_vec()),
        )
        .map_err(metrics_err)?;
        registry.register(Box::new(runtime_ms.clone())).map_err(metrics_err)?;
        registry.register(Box::new(enqueue_ms.clone())).map_err(metrics_err)?;
        Ok(Self { registry, runtime_ms, enqueue_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histograms_register_and_observe() {
        let metrics = AnalyzerMetrics::new().unwrap();
        metrics.runtime_ms.observe(42.0);
        metrics.enqueue_ms.observe(7.0);
        assert_eq!(metrics.runtime_ms.get_sample_count(), 1);
        assert_eq!(metrics.enqueue_ms.get_sample_count(), 1);
    }
}
