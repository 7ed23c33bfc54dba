//! vigil-analyzer
//!
//! Asynchronous heartbeat analysis. The ingest path acks immediately after
//! persisting and enqueueing; workers here pull jobs off the coordination
//! queue, run the trust engine against the device's recent history, maintain
//! the Welford baseline, publish decisions, and trigger revoke-and-block
//! when a score falls under the device's adaptive threshold.
//!
//! Two circuit breakers shed load before any scoring work: a queue-depth
//! breaker and a p95-runtime breaker. Ingestion never blocks on the workers.

pub mod breaker;
pub mod job;
pub mod metrics;
pub mod worker;

pub use breaker::BreakerConfig;
pub use job::AnalyzeJob;
pub use metrics::AnalyzerMetrics;
pub use worker::AnalyzerWorker;
