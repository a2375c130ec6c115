//! Delivery job queue abstraction.
//!
//! Jobs are typed payloads (`DeliveryJob`) pushed onto priority lanes.
//! The Redis implementation uses one list per lane plus a sorted set for
//! delayed jobs, scored by due time; consumers promote due entries before
//! blocking on the lanes in priority order. All retry bookkeeping lives on
//! the persisted record, not in the queue.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::types::Priority;

/// Sorted set holding delayed jobs, scored by due epoch seconds.
const SCHEDULED_KEY: &str = "fairway:queue:scheduled";

/// Maximum delayed entries promoted per pop cycle.
const PROMOTE_BATCH: isize = 100;

/// One delivery task for one notification record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryJob {
    pub record_id: Uuid,
    /// 1-based attempt number this invocation represents.
    pub attempt: u32,
}

/// A delayed job together with its target lane.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DelayedEntry {
    job: DeliveryJob,
    priority: Priority,
}

/// Producer side of the delivery queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Push a job onto the lane for `priority`, ready immediately.
    async fn enqueue(&self, job: DeliveryJob, priority: Priority) -> Result<(), AppError>;

    /// Schedule a job to become ready after `delay`.
    async fn enqueue_delayed(
        &self,
        job: DeliveryJob,
        priority: Priority,
        delay: Duration,
    ) -> Result<(), AppError>;
}

/// Redis key for a priority lane.
pub fn lane_key(priority: Priority) -> String {
    format!("fairway:queue:{}", priority.queue_lane())
}

/// Redis-backed delivery queue.
#[derive(Clone)]
pub struct RedisQueue {
    redis: ConnectionManager,
}

impl RedisQueue {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    /// Blocking pop across all lanes in priority order.
    ///
    /// Promotes due delayed jobs first, then waits up to `timeout` for the
    /// next job. Returns `None` when the timeout elapses with nothing ready.
    pub async fn pop(&self, timeout: Duration) -> Result<Option<DeliveryJob>, AppError> {
        let mut conn = self.redis.clone();
        self.promote_due(&mut conn).await?;

        let result: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(lane_key(Priority::High))
            .arg(lane_key(Priority::Normal))
            .arg(lane_key(Priority::Low))
            .arg(timeout.as_secs().max(1))
            .query_async(&mut conn)
            .await?;

        match result {
            Some((_, payload)) => {
                let job: DeliveryJob = serde_json::from_str(&payload)
                    .map_err(|e| AppError::Internal(format!("Malformed job payload: {}", e)))?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    /// Move due entries from the scheduled set onto their lanes.
    ///
    /// ZREM before LPUSH: the member is only pushed by whichever consumer
    /// actually removed it, so concurrent workers never duplicate a job.
    async fn promote_due(&self, conn: &mut ConnectionManager) -> Result<(), AppError> {
        let now = Utc::now().timestamp();
        let due: Vec<String> = conn
            .zrangebyscore_limit(SCHEDULED_KEY, "-inf", now, 0, PROMOTE_BATCH)
            .await?;

        for member in due {
            let removed: i64 = conn.zrem(SCHEDULED_KEY, &member).await?;
            if removed == 0 {
                continue;
            }
            let entry: DelayedEntry = match serde_json::from_str(&member) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping malformed scheduled entry");
                    continue;
                }
            };
            let payload = serde_json::to_string(&entry.job)
                .map_err(|e| AppError::Internal(format!("Failed to encode job: {}", e)))?;
            let _: () = conn.lpush(lane_key(entry.priority), payload).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn enqueue(&self, job: DeliveryJob, priority: Priority) -> Result<(), AppError> {
        let mut conn = self.redis.clone();
        let payload = serde_json::to_string(&job)
            .map_err(|e| AppError::Internal(format!("Failed to encode job: {}", e)))?;
        let _: () = conn.lpush(lane_key(priority), payload).await?;

        tracing::debug!(record_id = %job.record_id, attempt = job.attempt, lane = priority.queue_lane(), "Job enqueued");
        Ok(())
    }

    async fn enqueue_delayed(
        &self,
        job: DeliveryJob,
        priority: Priority,
        delay: Duration,
    ) -> Result<(), AppError> {
        if delay.is_zero() {
            return self.enqueue(job, priority).await;
        }

        let due = Utc::now().timestamp() + delay.as_secs() as i64;
        let entry = DelayedEntry { job, priority };
        let member = serde_json::to_string(&entry)
            .map_err(|e| AppError::Internal(format!("Failed to encode job: {}", e)))?;

        let mut conn = self.redis.clone();
        let _: () = conn.zadd(SCHEDULED_KEY, member, due).await?;

        tracing::debug!(
            record_id = %entry.job.record_id,
            attempt = entry.job.attempt,
            delay_secs = delay.as_secs(),
            "Job scheduled"
        );
        Ok(())
    }
}

/// In-process queue used by tests and local development without Redis.
///
/// Immediate and delayed jobs are kept separately so callers can assert on
/// what was enqueued and with what delay.
#[derive(Default)]
pub struct InMemoryQueue {
    ready: Mutex<VecDeque<(DeliveryJob, Priority)>>,
    delayed: Mutex<Vec<(DeliveryJob, Priority, Duration)>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pop the next ready job, ignoring lane priority.
    pub fn pop_ready(&self) -> Option<(DeliveryJob, Priority)> {
        self.ready.lock().unwrap().pop_front()
    }

    /// Number of ready jobs.
    pub fn ready_len(&self) -> usize {
        self.ready.lock().unwrap().len()
    }

    /// Drain all delayed jobs.
    pub fn drain_delayed(&self) -> Vec<(DeliveryJob, Priority, Duration)> {
        std::mem::take(&mut *self.delayed.lock().unwrap())
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn enqueue(&self, job: DeliveryJob, priority: Priority) -> Result<(), AppError> {
        self.ready.lock().unwrap().push_back((job, priority));
        Ok(())
    }

    async fn enqueue_delayed(
        &self,
        job: DeliveryJob,
        priority: Priority,
        delay: Duration,
    ) -> Result<(), AppError> {
        self.delayed.lock().unwrap().push((job, priority, delay));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_keys() {
        assert_eq!(lane_key(Priority::High), "fairway:queue:high");
        assert_eq!(lane_key(Priority::Normal), "fairway:queue:normal");
        assert_eq!(lane_key(Priority::Low), "fairway:queue:low");
    }

    #[test]
    fn test_job_payload_round_trip() {
        let job = DeliveryJob {
            record_id: Uuid::new_v4(),
            attempt: 2,
        };
        let payload = serde_json::to_string(&job).unwrap();
        let back: DeliveryJob = serde_json::from_str(&payload).unwrap();
        assert_eq!(back, job);
    }

    #[tokio::test]
    async fn test_in_memory_queue_separates_delayed() {
        let queue = InMemoryQueue::new();
        let job = DeliveryJob {
            record_id: Uuid::new_v4(),
            attempt: 1,
        };

        queue.enqueue(job.clone(), Priority::High).await.unwrap();
        queue
            .enqueue_delayed(job.clone(), Priority::Normal, Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(queue.ready_len(), 1);
        let (ready, lane) = queue.pop_ready().unwrap();
        assert_eq!(ready, job);
        assert_eq!(lane, Priority::High);

        let delayed = queue.drain_delayed();
        assert_eq!(delayed.len(), 1);
        assert_eq!(delayed[0].2, Duration::from_secs(30));
    }
}
