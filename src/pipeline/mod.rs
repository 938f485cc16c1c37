pub mod encoder;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
};
use thiserror::Error;
use tracing::Instrument;

use crate::config::MediaLayout;
use crate::entities::{image, video_project, Image, VideoProject, VideoStatus};

pub use encoder::{Canvas, EncodeJob, Encoder, FfmpegEncoder};

/// Failure reasons recorded on a project's `error_message`.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No images found")]
    NoImages,

    #[error("Image not found: {0}")]
    MissingImage(String),

    #[error("Cannot read image {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: ::image::ImageError,
    },

    #[error("{0}")]
    Encoder(String),

    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// What a single run did to the project.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// No project with that id.
    Missing,
    /// The project was not pending, so another run owns it or already finished it.
    Skipped(VideoStatus),
    Succeeded(String),
    Failed(String),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Missing => "missing",
            Outcome::Skipped(_) => "skipped",
            Outcome::Succeeded(_) => "success",
            Outcome::Failed(_) => "failed",
        }
    }
}

/// Generates the slideshow video for a project and drives its status
/// pending -> processing -> success | failed.
#[derive(Clone)]
pub struct VideoPipeline {
    db: DatabaseConnection,
    media: MediaLayout,
    encoder: Arc<dyn Encoder>,
}

impl VideoPipeline {
    pub fn new(db: DatabaseConnection, media: MediaLayout, encoder: Arc<dyn Encoder>) -> Self {
        Self { db, media, encoder }
    }

    pub fn encoder_name(&self) -> &str {
        self.encoder.name()
    }

    /// Runs the pipeline once. Never returns an error: every failure after the claim
    /// ends up on the project as `failed` with a message.
    pub async fn run(&self, project_id: i32) -> Outcome {
        let span = tracing::info_span!(
            "generate_video_job",
            "otel.name" = "generate_video_job",
            project_id,
            encoder = self.encoder.name(),
            outcome = tracing::field::Empty,
        );

        async move {
            let start = Instant::now();
            let outcome = match self.drive(project_id).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(error = %e, "video pipeline aborted on database error");
                    Outcome::Failed(e.to_string())
                }
            };

            tracing::Span::current().record("outcome", outcome.label());
            match &outcome {
                Outcome::Missing => tracing::warn!("video project not found"),
                Outcome::Skipped(status) if status.is_terminal() => {
                    tracing::info!(status = status.as_str(), "video project already finished, skipping")
                }
                Outcome::Skipped(status) => {
                    tracing::info!(status = status.as_str(), "video project claimed elsewhere, skipping")
                }
                Outcome::Succeeded(path) => tracing::info!(video_path = %path, "video generated"),
                Outcome::Failed(reason) => tracing::warn!(reason = %reason, "video generation failed"),
            }

            crate::metrics::record_video_outcome(outcome.label(), start.elapsed());
            outcome
        }
        .instrument(span)
        .await
    }

    async fn drive(&self, project_id: i32) -> Result<Outcome, DbErr> {
        let Some(project) = VideoProject::find_by_id(project_id).one(&self.db).await? else {
            return Ok(Outcome::Missing);
        };

        if !claim(&self.db, project_id).await? {
            let current = VideoProject::find_by_id(project_id)
                .one(&self.db)
                .await?
                .map(|p| p.status)
                .unwrap_or(project.status);
            return Ok(Outcome::Skipped(current));
        }
        tracing::info!("video project claimed");

        match self.generate(project_id).await {
            Ok(video_path) => {
                finish(&self.db, project_id, VideoStatus::Success, Some(video_path.clone()), None)
                    .await?;
                Ok(Outcome::Succeeded(video_path))
            }
            Err(e) => {
                let reason = e.to_string();
                finish(&self.db, project_id, VideoStatus::Failed, None, Some(reason.clone()))
                    .await?;
                Ok(Outcome::Failed(reason))
            }
        }
    }

    async fn generate(&self, project_id: i32) -> Result<String, PipelineError> {
        let images = Image::find()
            .filter(image::Column::VideoProjectId.eq(project_id))
            .order_by_asc(image::Column::OrderIndex)
            .all(&self.db)
            .await?;
        if images.is_empty() {
            return Err(PipelineError::NoImages);
        }

        let mut frames = Vec::with_capacity(images.len());
        for image in &images {
            let path = PathBuf::from(&image.image_path);
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Err(PipelineError::MissingImage(image.image_path.clone()));
            }
            frames.push(path);
        }

        let canvas = probe_canvas(frames.clone()).await?;

        let videos_dir = self.media.videos_dir();
        tokio::fs::create_dir_all(&videos_dir).await?;
        let output = self.media.video_path(project_id);
        let partial = videos_dir.join(format!("video_{project_id}.partial.mp4"));

        let job = EncodeJob::new(frames, partial.clone(), canvas);
        let encoded = async {
            self.encoder.encode(&job).await?;
            tokio::fs::rename(&partial, &output).await?;
            Ok::<_, PipelineError>(())
        }
        .instrument(tracing::info_span!(
            "encode_video",
            frames = job.frames.len(),
            width = canvas.width,
            height = canvas.height
        ))
        .await;

        if let Err(e) = encoded {
            discard(&partial).await;
            return Err(e);
        }
        Ok(output.to_string_lossy().into_owned())
    }
}

/// Moves a project from pending to processing. Returns false when the row was not
/// pending, so at most one run ever proceeds past this point for a given project.
pub async fn claim(db: &DatabaseConnection, project_id: i32) -> Result<bool, DbErr> {
    let result = VideoProject::update_many()
        .col_expr(video_project::Column::Status, Expr::value(VideoStatus::Processing.as_str()))
        .col_expr(video_project::Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
        .filter(video_project::Column::Id.eq(project_id))
        .filter(video_project::Column::Status.eq(VideoStatus::Pending.as_str()))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

async fn finish(
    db: &DatabaseConnection,
    project_id: i32,
    status: VideoStatus,
    video_path: Option<String>,
    error_message: Option<String>,
) -> Result<(), DbErr> {
    debug_assert!(VideoStatus::Processing.can_transition_to(status));
    let result = VideoProject::update_many()
        .col_expr(video_project::Column::Status, Expr::value(status.as_str()))
        .col_expr(video_project::Column::VideoPath, Expr::value(video_path))
        .col_expr(video_project::Column::ErrorMessage, Expr::value(error_message))
        .col_expr(video_project::Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
        .filter(video_project::Column::Id.eq(project_id))
        .filter(video_project::Column::Status.eq(VideoStatus::Processing.as_str()))
        .exec(db)
        .await?;
    if result.rows_affected != 1 {
        tracing::warn!(project_id, "video project left processing before it could be finished");
    }
    Ok(())
}

async fn probe_canvas(frames: Vec<PathBuf>) -> Result<Canvas, PipelineError> {
    tokio::task::spawn_blocking(move || {
        let mut dimensions = Vec::with_capacity(frames.len());
        for frame in &frames {
            let size = ::image::image_dimensions(frame).map_err(|source| {
                PipelineError::Unreadable {
                    path: frame.to_string_lossy().into_owned(),
                    source,
                }
            })?;
            dimensions.push(size);
        }
        Canvas::fit(&dimensions).ok_or(PipelineError::NoImages)
    })
    .await
    .map_err(|e| PipelineError::Encoder(format!("image probe task failed: {e}")))?
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove partial video");
        }
    }
}
