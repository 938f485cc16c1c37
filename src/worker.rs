use std::sync::Arc;
use std::time::Duration;

use redis::AsyncCommands;
use tracing::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::pipeline::{Outcome, VideoPipeline};
use crate::queue::{self, VideoJob, VIDEO_QUEUE};

/// Spawns `concurrency` consumers that pop `video_queue` and run the pipeline for each
/// project id. Also starts the queue-depth monitor.
pub fn start_workers(redis_client: redis::Client, pipeline: VideoPipeline, concurrency: usize) {
    queue::start_queue_monitor(redis_client.clone());

    let redis_client = Arc::new(redis_client);
    let pipeline = Arc::new(pipeline);

    for i in 0..concurrency.max(1) {
        let redis_client = redis_client.clone();
        let pipeline = pipeline.clone();

        tokio::spawn(async move {
            tracing::info!("Worker {} started", i);
            loop {
                let mut conn = match redis_client.get_multiplexed_async_connection().await {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::error!("Worker {}: Failed to get redis conn: {}", i, e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let result: redis::RedisResult<(String, String)> =
                    conn.blpop(VIDEO_QUEUE, 0.0).await;

                match result {
                    Ok((_key, payload)) => match VideoJob::parse(&payload) {
                        Ok(job) => {
                            process_job(&pipeline, job).await;
                        }
                        Err(e) => tracing::error!("Worker {}: Bad payload {:?}: {}", i, payload, e),
                    },
                    Err(e) => {
                        tracing::error!("Worker {}: Redis error: {}", i, e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });
    }
}

/// Runs one dequeued job under a span parented to the enqueuing request's trace.
pub async fn process_job(pipeline: &VideoPipeline, job: VideoJob) -> Outcome {
    let span = tracing::info_span!(
        "process_video_job",
        "otel.name" = "process_video_job",
        project_id = job.video_project_id,
    );
    span.set_parent(job.parent_context());

    async {
        tracing::info!("Dequeued video project {} from {}", job.video_project_id, VIDEO_QUEUE);
        pipeline.run(job.video_project_id).await
    }
    .instrument(span)
    .await
}
