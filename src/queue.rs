use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub const VIDEO_QUEUE: &str = "video_queue";

/// Payload pushed onto `video_queue` for each new project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoJob {
    pub video_project_id: i32,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub trace_context: HashMap<String, String>,
}

impl VideoJob {
    /// Captures the current span's trace context so the worker can continue the trace.
    pub fn new(video_project_id: i32) -> Self {
        let mut trace_context = HashMap::new();
        let cx = tracing::Span::current().context();
        TraceContextPropagator::new().inject_context(&cx, &mut trace_context);
        Self {
            video_project_id,
            trace_context,
        }
    }

    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    pub fn parent_context(&self) -> opentelemetry::Context {
        TraceContextPropagator::new().extract(&self.trace_context)
    }
}

pub async fn enqueue_video(redis: &redis::Client, project_id: i32) -> redis::RedisResult<()> {
    let job = VideoJob::new(project_id);
    let payload = serde_json::to_string(&job).map_err(|e| {
        redis::RedisError::from((
            redis::ErrorKind::TypeError,
            "failed to encode video job",
            e.to_string(),
        ))
    })?;

    let mut conn = redis.get_multiplexed_async_connection().await?;
    let _: () = conn.rpush(VIDEO_QUEUE, payload).await?;
    tracing::info!(project_id, queue = VIDEO_QUEUE, "video job enqueued");
    Ok(())
}

/// Hand-off point between the upload endpoint and the workers.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue_video(&self, project_id: i32) -> redis::RedisResult<()>;
}

pub type SharedQueue = Arc<dyn JobQueue>;

#[async_trait]
impl JobQueue for redis::Client {
    async fn enqueue_video(&self, project_id: i32) -> redis::RedisResult<()> {
        enqueue_video(self, project_id).await
    }
}

/// Samples the queue length into a gauge every 15 seconds.
pub fn start_queue_monitor(redis_client: redis::Client) {
    tokio::spawn(async move {
        tracing::info!("Queue monitor started");
        loop {
            match redis_client.get_multiplexed_async_connection().await {
                Ok(mut conn) => {
                    let len: redis::RedisResult<u64> = conn.llen(VIDEO_QUEUE).await;
                    match len {
                        Ok(len) => crate::metrics::set_queue_depth(VIDEO_QUEUE, len),
                        Err(e) => tracing::error!("Failed to get {} len: {}", VIDEO_QUEUE, e),
                    }
                }
                Err(e) => tracing::error!("Queue monitor: failed to get redis conn: {}", e),
            }
            tokio::time::sleep(Duration::from_secs(15)).await;
        }
    });
}
