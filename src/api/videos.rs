use std::path::{Path as FsPath, PathBuf};

use axum::{
    body::Bytes,
    extract::{Extension, Json, Multipart, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, LoaderTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use serde_json::json;

use crate::config::MediaLayout;
use crate::entities::{image, video_project, Image, VideoProject, VideoStatus};
use crate::error::{AppError, AppResult};
use crate::queue::SharedQueue;

pub const ALLOWED_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".webp"];
const UPLOAD_FIELD: &str = "images";

/// Checks every uploaded file name and returns each file's extension (with the dot,
/// original case). Fails on the first name whose extension is not allowed.
pub fn validate_upload_names<S: AsRef<str>>(names: &[S]) -> AppResult<Vec<String>> {
    if names.is_empty() {
        return Err(AppError::Validation("No images provided".into()));
    }

    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            extension_of(name)
                .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .ok_or_else(|| {
                    AppError::Validation(format!(
                        "Invalid file type: {name}. Allowed: {}",
                        ALLOWED_EXTENSIONS.join(", ")
                    ))
                })
        })
        .collect()
}

fn extension_of(name: &str) -> Option<String> {
    FsPath::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
}

#[derive(Debug, Serialize)]
pub struct ImageRead {
    pub id: i32,
    pub image_url: String,
    pub order_index: i32,
}

#[derive(Debug, Serialize)]
pub struct VideoProjectRead {
    pub id: i32,
    pub status: VideoStatus,
    pub video_url: Option<String>,
    pub error_message: Option<String>,
    pub created_at: sea_orm::prelude::DateTimeWithTimeZone,
    pub updated_at: sea_orm::prelude::DateTimeWithTimeZone,
    pub images: Vec<ImageRead>,
}

impl VideoProjectRead {
    pub fn new(
        project: video_project::Model,
        mut images: Vec<image::Model>,
        media: &MediaLayout,
    ) -> Self {
        images.sort_by_key(|i| i.order_index);
        Self {
            id: project.id,
            status: project.status,
            video_url: project.video_path.as_deref().map(|p| media.video_url(p)),
            error_message: project.error_message,
            created_at: project.created_at,
            updated_at: project.updated_at,
            images: images
                .into_iter()
                .map(|i| ImageRead {
                    id: i.id,
                    image_url: media.image_url(&i.image_path),
                    order_index: i.order_index,
                })
                .collect(),
        }
    }
}

pub async fn upload_images(
    Extension(db): Extension<DatabaseConnection>,
    Extension(queue): Extension<SharedQueue>,
    Extension(media): Extension<MediaLayout>,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let mut names = Vec::new();
    let mut contents: Vec<Bytes> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        names.push(field.file_name().unwrap_or_default().to_string());
        contents.push(
            field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?,
        );
    }

    let extensions = validate_upload_names(names.as_slice())?;

    let txn = db.begin().await?;
    let now = chrono::Utc::now().fixed_offset();
    let project = video_project::ActiveModel {
        status: Set(VideoStatus::Pending),
        video_path: Set(None),
        error_message: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let written = match store_images(&media, project.id, &contents, &extensions).await {
        Ok(paths) => paths,
        Err(e) => {
            txn.rollback().await?;
            return Err(e);
        }
    };

    let rows = written.iter().enumerate().map(|(index, path)| image::ActiveModel {
        video_project_id: Set(project.id),
        image_path: Set(path.to_string_lossy().into_owned()),
        order_index: Set(index as i32),
        ..Default::default()
    });
    if let Err(e) = Image::insert_many(rows).exec(&txn).await {
        remove_files(&written).await;
        return Err(e.into());
    }
    if let Err(e) = txn.commit().await {
        remove_files(&written).await;
        return Err(e.into());
    }

    // Without a queued job nothing would ever pick the project up.
    if let Err(e) = queue.enqueue_video(project.id).await {
        tracing::error!(
            project_id = project.id,
            error = %e,
            "failed to enqueue video job, discarding upload"
        );
        if let Err(db_err) = delete_project(&db, project.id).await {
            tracing::error!(
                project_id = project.id,
                error = %db_err,
                "failed to discard video project"
            );
        }
        remove_files(&written).await;
        return Err(e.into());
    }

    tracing::Span::current()
        .record("table", "video_projects")
        .record("action", "upload_images")
        .record("project_id", project.id)
        .record("business_event", "Video project created");
    crate::metrics::increment_video_projects_created();

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": project.id,
            "status": project.status,
            "message": "Images uploaded successfully. Video generation started.",
        })),
    )
        .into_response())
}

async fn store_images(
    media: &MediaLayout,
    project_id: i32,
    contents: &[Bytes],
    extensions: &[String],
) -> AppResult<Vec<PathBuf>> {
    tokio::fs::create_dir_all(media.images_dir()).await?;

    let mut written = Vec::with_capacity(contents.len());
    for (index, (bytes, ext)) in contents.iter().zip(extensions).enumerate() {
        let path = media.image_path(project_id, index, ext);
        if let Err(e) = tokio::fs::write(&path, bytes).await {
            remove_files(&written).await;
            return Err(e.into());
        }
        written.push(path);
    }
    Ok(written)
}

async fn delete_project(db: &DatabaseConnection, project_id: i32) -> Result<(), DbErr> {
    let txn = db.begin().await?;
    Image::delete_many()
        .filter(image::Column::VideoProjectId.eq(project_id))
        .exec(&txn)
        .await?;
    VideoProject::delete_by_id(project_id).exec(&txn).await?;
    txn.commit().await
}

async fn remove_files(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove uploaded image");
        }
    }
}

pub async fn list_projects(
    Extension(db): Extension<DatabaseConnection>,
    Extension(media): Extension<MediaLayout>,
) -> AppResult<Json<Vec<VideoProjectRead>>> {
    let projects = VideoProject::find()
        .order_by_asc(video_project::Column::Id)
        .all(&db)
        .await?;
    let images = projects.load_many(Image, &db).await?;

    Ok(Json(
        projects
            .into_iter()
            .zip(images)
            .map(|(project, images)| VideoProjectRead::new(project, images, &media))
            .collect(),
    ))
}

pub async fn get_project(
    Extension(db): Extension<DatabaseConnection>,
    Extension(media): Extension<MediaLayout>,
    Path(project_id): Path<i32>,
) -> AppResult<Json<VideoProjectRead>> {
    tracing::Span::current().record("project_id", project_id);

    let project = VideoProject::find_by_id(project_id)
        .one(&db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video project {project_id} not found")))?;
    let images = vec![project.clone()].load_many(Image, &db).await?;

    Ok(Json(VideoProjectRead::new(
        project,
        images.into_iter().next().unwrap_or_default(),
        &media,
    )))
}
