use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use vigil_core::constants::{
    BASELINE_TTL_SECS, DECISION_TTL_SECS, KILL_SWITCH_CHANNEL, RECENT_PAYLOAD_CAP,
    RUNTIME_SAMPLE_CAP, RUNTIME_SAMPLE_WINDOW,
};
use vigil_core::error::VigilError;
use vigil_core::payload::SensorPayload;
use vigil_core::types::ThreatLevel;
use vigil_coord::keys::{self, RUNTIME_SAMPLES_KEY};
use vigil_coord::CoordClient;
use vigil_store::Store;
use vigil_tokens::TokenService;
use vigil_trust::{compute_trust_score, WelfordBaseline};

use crate::breaker::{adaptive_threshold, p95, BreakerConfig};
use crate::job::AnalyzeJob;
use crate::metrics::AnalyzerMetrics;

const AUDIT_REASON: &str = "Trust score below adaptive threshold";

/// One analyzer worker. The server spawns one per core; jobs for different
/// devices are independent, and baseline writes are last-writer-wins.
pub struct AnalyzerWorker {
    coord: CoordClient,
    store: Store,
    tokens: Arc<TokenService>,
    metrics: Arc<AnalyzerMetrics>,
    breakers: BreakerConfig,
}

impl AnalyzerWorker {
    pub fn new(
        coord: CoordClient,
        store: Store,
        tokens: Arc<TokenService>,
        metrics: Arc<AnalyzerMetrics>,
        breakers: BreakerConfig,
    ) -> Self {
        Self { coord, store, tokens, metrics, breakers }
    }

    /// Pull-and-process loop. Job failures are logged and the job dropped —
    /// the heartbeat was acked long ago, so there is nothing to surface.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                job = AnalyzeJob::dequeue(&self.coord, 1.0) => match job {
                    Ok(Some(job)) => {
                        let device_id = job.device_id.clone();
                        if let Err(e) = self.process(job).await {
                            warn!(device_id, error = %e, "analyzer job failed");
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(error = %e, "analyzer queue read failed");
                        tokio::time::sleep(Duration::from_millis(500)).await;
                    }
                },
            }
        }
        debug!("analyzer worker stopped");
    }

    /// Run one job through breakers, scoring, baseline update, decision
    /// publication, and (when warranted) enforcement.
    pub async fn process(&self, job: AnalyzeJob) -> Result<(), VigilError> {
        let started = Instant::now();
        let enqueue_ms = (Utc::now() - job.enqueued_at).num_milliseconds().max(0);
        self.metrics.enqueue_ms.observe(enqueue_ms as f64);

        // Breakers shed load before any scoring work, and never raise: a
        // coordination hiccup here must not take down analysis entirely.
        let depth = AnalyzeJob::queue_depth(&self.coord).await.unwrap_or(0);
        if depth > self.breakers.queue_depth_limit {
            debug!(depth, device_id = %job.device_id, "queue-depth breaker dropped job");
            return Ok(());
        }

        let samples: Vec<u64> = self
            .coord
            .lrange(RUNTIME_SAMPLES_KEY, 0, RUNTIME_SAMPLE_WINDOW as isize - 1)
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();
        if let Some(p95_ms) = p95(&samples) {
            if p95_ms > self.breakers.p95_limit_ms {
                let has_decision = self
                    .coord
                    .get(&keys::decision_key(&job.device_id))
                    .await
                    .unwrap_or(None)
                    .is_some();
                if has_decision {
                    debug!(p95_ms, device_id = %job.device_id, "latency breaker dropped job");
                    return Ok(());
                }
            }
        }

        // ── Score against recent history ──────────────────────────────────────
        let raw_history = self
            .coord
            .lrange(
                &keys::recent_payload_key(&job.device_id),
                0,
                RECENT_PAYLOAD_CAP as isize - 1,
            )
            .await?;
        let history: Vec<SensorPayload> = raw_history
            .iter()
            .filter_map(|item| serde_json::from_str(item).ok())
            .collect();

        let (score, diag) = compute_trust_score(&job.payload, &history);

        self.coord
            .hset_all(
                &keys::trust_diag_key(&job.device_id),
                &[
                    ("accel_z", diag.accel_z.to_string()),
                    ("gyro_z", diag.gyro_z.to_string()),
                    ("touch_entropy", diag.touch_entropy.to_string()),
                    ("corr", diag.accel_gyro_corr.to_string()),
                ],
            )
            .await?;

        // ── Baseline update (Welford) ─────────────────────────────────────────
        let baseline_key = keys::baseline_key(&job.device_id);
        let fields = self.coord.hgetall(&baseline_key).await?;
        let mut baseline = WelfordBaseline::from_fields(
            fields.get("mean").map(String::as_str),
            fields.get("m2").map(String::as_str),
            fields.get("count").map(String::as_str),
        );
        baseline.update(score as f64);
        let std = baseline.std();
        self.coord
            .hset_all(
                &baseline_key,
                &[
                    ("mean", baseline.mean.to_string()),
                    ("m2", baseline.m2.to_string()),
                    ("count", baseline.count.to_string()),
                    ("std", std.to_string()),
                ],
            )
            .await?;
        self.coord.expire(&baseline_key, BASELINE_TTL_SECS).await?;

        let threshold = adaptive_threshold(baseline.mean, std, baseline.count);

        // ── Publish the decision ──────────────────────────────────────────────
        self.coord
            .set_ex(&keys::decision_key(&job.device_id), &score.to_string(), DECISION_TTL_SECS)
            .await?;
        let hist_key = keys::trust_hist_key(&job.device_id);
        self.coord.lpush(&hist_key, &score.to_string()).await?;
        self.coord.ltrim(&hist_key, 0, RECENT_PAYLOAD_CAP as isize - 1).await?;

        // ── Enforcement ───────────────────────────────────────────────────────
        // Best-effort from here on: the decision above stays published even
        // if audit or revocation fails.
        if (score as f64) < threshold {
            let level = if score < 20 { ThreatLevel::High } else { ThreatLevel::Medium };
            info!(
                device_id = %job.device_id,
                score,
                threshold,
                level = %level,
                "trust score below adaptive threshold"
            );
            if let Err(e) = self
                .store
                .insert_audit(&job.user_id, &job.device_id, level, AUDIT_REASON, Some(job.signal_id))
                .await
            {
                warn!(device_id = %job.device_id, error = %e, "audit insert failed");
            }
            if let Err(e) = self
                .tokens
                .revoke_and_block(&job.user_id, &job.device_id, true)
                .await
            {
                warn!(device_id = %job.device_id, error = %e, "revoke-and-block failed");
            }
            if let Err(e) = self
                .coord
                .publish(KILL_SWITCH_CHANNEL, &format!("block:{}:score:{}", job.device_id, score))
                .await
            {
                warn!(device_id = %job.device_id, error = %e, "kill-switch publish failed");
            }
        }

        // ── Latency bookkeeping ───────────────────────────────────────────────
        let runtime_ms = started.elapsed().as_millis() as u64;
        self.metrics.runtime_ms.observe(runtime_ms as f64);
        if let Err(e) = self.coord.lpush(RUNTIME_SAMPLES_KEY, &runtime_ms.to_string()).await {
            debug!(error = %e, "runtime sample push failed");
        } else {
            let _ = self
                .coord
                .ltrim(RUNTIME_SAMPLES_KEY, 0, RUNTIME_SAMPLE_CAP as isize - 1)
                .await;
        }
        Ok(())
    }
}
