use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vigil_core::error::VigilError;
use vigil_core::payload::SensorPayload;
use vigil_coord::keys::ANALYZER_QUEUE_KEY;
use vigil_coord::CoordClient;

/// One unit of analysis work, serialized onto the coordination queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeJob {
    pub signal_id: i64,
    pub user_id: String,
    pub device_id: String,
    pub payload: SensorPayload,
    pub enqueued_at: DateTime<Utc>,
}

impl AnalyzeJob {
    /// Push onto the tail of the queue (workers pop the head, FIFO).
    pub async fn enqueue(&self, coord: &CoordClient) -> Result<(), VigilError> {
        let encoded = serde_json::to_string(self)
            .map_err(|e| VigilError::Serialization(e.to_string()))?;
        coord.rpush(ANALYZER_QUEUE_KEY, &encoded).await
    }

    /// Current queue depth, read by the depth breaker.
    pub async fn queue_depth(coord: &CoordClient) -> Result<i64, VigilError> {
        coord.llen(ANALYZER_QUEUE_KEY).await
    }

    /// Blocking pop with a timeout; `None` when the queue stayed empty.
    /// Undecodable entries are dropped with a warning rather than wedging
    /// the queue.
    pub async fn dequeue(
        coord: &CoordClient,
        timeout_secs: f64,
    ) -> Result<Option<Self>, VigilError> {
        let Some(raw) = coord.blpop(ANALYZER_QUEUE_KEY, timeout_secs).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(job) => Ok(Some(job)),
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable analyzer job");
                Ok(None)
            }
        }
    }
}
