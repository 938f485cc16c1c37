use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::PipelineError;

pub const FRAME_RATE: u32 = 24;
pub const SECONDS_PER_IMAGE: u32 = 2;

/// Output frame size. Both sides are always even so yuv420p can encode it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    /// Largest width and height across all frames, each rounded down to an even number.
    pub fn fit(dimensions: &[(u32, u32)]) -> Option<Canvas> {
        let width = dimensions.iter().map(|(w, _)| *w).max()?;
        let height = dimensions.iter().map(|(_, h)| *h).max()?;
        Some(Canvas {
            width: even_floor(width),
            height: even_floor(height),
        })
    }
}

/// Never returns less than 2.
pub fn even_floor(value: u32) -> u32 {
    (value & !1).max(2)
}

/// A single encode request: frames in display order, one fixed slot each.
#[derive(Clone, Debug)]
pub struct EncodeJob {
    pub frames: Vec<PathBuf>,
    pub output: PathBuf,
    pub canvas: Canvas,
    pub seconds_per_image: u32,
    pub fps: u32,
}

impl EncodeJob {
    pub fn new(frames: Vec<PathBuf>, output: PathBuf, canvas: Canvas) -> Self {
        Self {
            frames,
            output,
            canvas,
            seconds_per_image: SECONDS_PER_IMAGE,
            fps: FRAME_RATE,
        }
    }

    pub fn duration_secs(&self) -> u32 {
        self.frames.len() as u32 * self.seconds_per_image
    }
}

/// Turns an ordered list of still images into a video file.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Write the video to `job.output`. Nothing is guaranteed about that path on error.
    async fn encode(&self, job: &EncodeJob) -> Result<(), PipelineError>;

    /// Check if this encoder can run on the current system.
    fn is_available(&self) -> bool;

    /// Encoder name.
    fn name(&self) -> &str;
}

/// Drives the `ffmpeg` binary: each image is looped for its slot, scaled to fit the
/// canvas, letterboxed, and the slots are concatenated into one H.264 stream.
#[derive(Clone, Debug)]
pub struct FfmpegEncoder {
    binary: String,
    preset: String,
}

impl FfmpegEncoder {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            preset: "medium".to_string(),
        }
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    pub fn args(&self, job: &EncodeJob) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-y"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        for frame in &job.frames {
            args.extend([
                "-loop".to_string(),
                "1".to_string(),
                "-framerate".to_string(),
                job.fps.to_string(),
                "-t".to_string(),
                job.seconds_per_image.to_string(),
                "-i".to_string(),
                path_arg(frame),
            ]);
        }

        args.extend([
            "-filter_complex".to_string(),
            filter_graph(job),
            "-map".to_string(),
            "[out]".to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            self.preset.clone(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-r".to_string(),
            job.fps.to_string(),
            "-an".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            path_arg(&job.output),
        ]);
        args
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn encode(&self, job: &EncodeJob) -> Result<(), PipelineError> {
        if job.frames.is_empty() {
            return Err(PipelineError::NoImages);
        }

        tracing::debug!(
            frames = job.frames.len(),
            width = job.canvas.width,
            height = job.canvas.height,
            output = %job.output.display(),
            "starting ffmpeg"
        );

        let output = Command::new(&self.binary)
            .args(self.args(job))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PipelineError::Encoder(format!("failed to start {}: {e}", self.binary)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Encoder(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                last_lines(&stderr, 5)
            )));
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        std::process::Command::new(&self.binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

fn filter_graph(job: &EncodeJob) -> String {
    let Canvas { width, height } = job.canvas;
    let mut graph = String::new();
    for index in 0..job.frames.len() {
        graph.push_str(&format!(
            "[{index}:v]scale={width}:{height}:force_original_aspect_ratio=decrease,\
             pad={width}:{height}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps},format=yuv420p[v{index}];",
            fps = job.fps
        ));
    }
    for index in 0..job.frames.len() {
        graph.push_str(&format!("[v{index}]"));
    }
    graph.push_str(&format!("concat=n={}:v=1:a=0[out]", job.frames.len()));
    graph
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join(" | ")
}
