use std::sync::Arc;

use recipe_catalog::config::Config;
use recipe_catalog::pipeline::{Encoder, FfmpegEncoder, VideoPipeline};
use recipe_catalog::worker;
use sea_orm::Database;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    recipe_catalog::telemetry::init_telemetry("recipe-catalog-worker");
    let config = Config::load();

    let (prometheus_layer, metric_handle) = axum_prometheus::PrometheusMetricLayer::pair();

    let metrics_addr = config.worker_metrics_addr;
    tokio::spawn(async move {
        let app = axum::Router::new()
            .route(
                "/metrics",
                axum::routing::get(|| async move { metric_handle.render() }),
            )
            .layer(prometheus_layer);
        tracing::info!("Metrics server listening on {}", metrics_addr);
        match tokio::net::TcpListener::bind(metrics_addr).await {
            Ok(listener) => {
                if let Err(e) = axum::serve(listener, app).await {
                    tracing::error!("Metrics server failed: {}", e);
                }
            }
            Err(e) => tracing::error!("Failed to bind metrics server on {}: {}", metrics_addr, e),
        }
    });

    let db = Database::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    let redis_client = redis::Client::open(config.redis_url.clone()).expect("Invalid Redis URL");

    let encoder =
        FfmpegEncoder::new(config.ffmpeg_bin.clone()).with_preset(config.ffmpeg_preset.clone());
    if !encoder.is_available() {
        tracing::warn!(
            "{} not runnable; every video job will fail until it is installed",
            config.ffmpeg_bin
        );
    }

    let pipeline = VideoPipeline::new(db, config.media(), Arc::new(encoder));

    tracing::info!(
        concurrency = config.worker_concurrency,
        encoder = pipeline.encoder_name(),
        "Starting video workers"
    );
    worker::start_workers(redis_client, pipeline, config.worker_concurrency);

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutting down worker process"),
        Err(err) => tracing::error!("Unable to listen for shutdown signal: {}", err),
    }
    recipe_catalog::telemetry::shutdown_telemetry();
}
