use std::{env, fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr};

use tracing::{info, warn};

/// Runtime settings shared by the server and worker binaries.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub bind_addr: SocketAddr,
    pub media_root: PathBuf,
    pub media_url_prefix: String,
    pub cors_origin: String,
    pub worker_concurrency: usize,
    pub worker_metrics_addr: SocketAddr,
    pub ffmpeg_bin: String,
    pub ffmpeg_preset: String,
}

impl Config {
    pub fn load() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            redis_url: try_load("REDIS_URL", "redis://localhost:6379"),
            bind_addr: try_load("BIND_ADDR", "0.0.0.0:8000"),
            media_root: try_load("MEDIA_ROOT", "media"),
            media_url_prefix: try_load::<String>("MEDIA_URL_PREFIX", "/media")
                .trim_end_matches('/')
                .to_string(),
            cors_origin: try_load("CORS_ORIGIN", "http://localhost:3000"),
            worker_concurrency: try_load("WORKER_CONCURRENCY", "3"),
            worker_metrics_addr: try_load("WORKER_METRICS_ADDR", "0.0.0.0:9091"),
            ffmpeg_bin: try_load("FFMPEG_BIN", "ffmpeg"),
            ffmpeg_preset: try_load("FFMPEG_PRESET", "medium"),
        }
    }

    pub fn media(&self) -> MediaLayout {
        MediaLayout::new(self.media_root.clone(), self.media_url_prefix.clone())
    }
}

/// On-disk and public-URL layout of uploaded images and generated videos.
#[derive(Clone, Debug)]
pub struct MediaLayout {
    pub root: PathBuf,
    pub url_prefix: String,
}

impl MediaLayout {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.into(),
        }
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.root.join("videos")
    }

    /// `images/project_<id>_img_<index><ext>`; `ext` includes the leading dot.
    pub fn image_path(&self, project_id: i32, index: usize, ext: &str) -> PathBuf {
        self.images_dir()
            .join(format!("project_{project_id}_img_{index}{ext}"))
    }

    pub fn video_path(&self, project_id: i32) -> PathBuf {
        self.videos_dir().join(format!("video_{project_id}.mp4"))
    }

    pub fn image_url(&self, stored_path: &str) -> String {
        format!("{}/images/{}", self.url_prefix, file_name(stored_path))
    }

    pub fn video_url(&self, stored_path: &str) -> String {
        format!("{}/videos/{}", self.url_prefix, file_name(stored_path))
    }
}

fn file_name(stored_path: &str) -> &str {
    std::path::Path::new(stored_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(stored_path)
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}
