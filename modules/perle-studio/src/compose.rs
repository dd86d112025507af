use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use perle_common::file_config::VideoConfig;

use crate::error::{ProductionError, Result, Stage};

/// How much of ffmpeg's stderr ends up in an error message.
const STDERR_TAIL_CHARS: usize = 600;
const PROBE_TIMEOUT: Duration = Duration::from_secs(20);

/// Muxes a still image and a narration track into a video file.
#[async_trait]
pub trait Composer: Send + Sync {
    /// Returns the duration of the written video when it can be measured.
    async fn compose(&self, image: &Path, audio: &Path, out: &Path) -> Result<Option<Duration>>;
}

pub struct FfmpegComposer {
    ffmpeg_bin: PathBuf,
    ffprobe_bin: PathBuf,
    fps: u32,
    tail_padding_secs: f32,
    timeout: Duration,
}

impl FfmpegComposer {
    pub fn new(ffmpeg_bin: impl Into<PathBuf>, ffprobe_bin: impl Into<PathBuf>, cfg: &VideoConfig) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            ffprobe_bin: ffprobe_bin.into(),
            fps: cfg.fps.max(1),
            tail_padding_secs: cfg.tail_padding_secs.max(0.0),
            timeout: Duration::from_secs(cfg.encode_timeout_secs.max(1)),
        }
    }

    /// Encoder arguments: the image loops for as long as the padded audio
    /// lasts, H.264 + AAC, moov atom up front for streaming.
    pub fn ffmpeg_args(&self, image: &Path, audio: &Path, out: &Path) -> Vec<String> {
        let fps = self.fps.to_string();
        vec![
            "-y".into(),
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-loop".into(),
            "1".into(),
            "-framerate".into(),
            fps.clone(),
            "-i".into(),
            image.display().to_string(),
            "-i".into(),
            audio.display().to_string(),
            "-af".into(),
            format!("apad=pad_dur={:.2}", self.tail_padding_secs),
            "-c:v".into(),
            "libx264".into(),
            "-tune".into(),
            "stillimage".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-r".into(),
            fps,
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            "128k".into(),
            "-shortest".into(),
            "-movflags".into(),
            "+faststart".into(),
            out.display().to_string(),
        ]
    }

    async fn probe_duration(&self, file: &Path) -> Option<Duration> {
        let result = tokio::time::timeout(
            PROBE_TIMEOUT,
            Command::new(&self.ffprobe_bin)
                .args([
                    "-v",
                    "error",
                    "-show_entries",
                    "format=duration",
                    "-of",
                    "default=noprint_wrappers=1:nokey=1",
                ])
                .arg(file)
                .kill_on_drop(true)
                .output(),
        )
        .await;

        match result {
            Ok(Ok(output)) if output.status.success() => {
                parse_probe_seconds(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(Ok(output)) => {
                warn!(stderr = %String::from_utf8_lossy(&output.stderr), "ffprobe exited with error");
                None
            }
            Ok(Err(e)) => {
                warn!(error = %e, "ffprobe could not be started");
                None
            }
            Err(_) => {
                warn!("ffprobe timed out");
                None
            }
        }
    }
}

pub(crate) fn parse_probe_seconds(stdout: &str) -> Option<Duration> {
    let secs: f64 = stdout.trim().lines().next()?.trim().parse().ok()?;
    (secs.is_finite() && secs > 0.0).then(|| Duration::from_secs_f64(secs))
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let skip = text.chars().count().saturating_sub(STDERR_TAIL_CHARS);
    text.chars().skip(skip).collect()
}

#[async_trait]
impl Composer for FfmpegComposer {
    async fn compose(&self, image: &Path, audio: &Path, out: &Path) -> Result<Option<Duration>> {
        let args = self.ffmpeg_args(image, audio, out);
        debug!(bin = %self.ffmpeg_bin.display(), out = %out.display(), "Running ffmpeg");

        let result = tokio::time::timeout(
            self.timeout,
            Command::new(&self.ffmpeg_bin)
                .args(&args)
                .kill_on_drop(true)
                .output(),
        )
        .await;

        match result {
            Ok(Ok(output)) if output.status.success() => {}
            Ok(Ok(output)) => {
                return Err(ProductionError::failed(
                    Stage::Compose,
                    format!("ffmpeg exited with {}: {}", output.status, stderr_tail(&output.stderr)),
                ));
            }
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                return Err(ProductionError::config(
                    Stage::Compose,
                    format!("ffmpeg binary not found: {}", self.ffmpeg_bin.display()),
                ));
            }
            Ok(Err(e)) => {
                return Err(ProductionError::failed(
                    Stage::Compose,
                    format!("failed to run ffmpeg: {e}"),
                ));
            }
            Err(_) => {
                return Err(ProductionError::failed(
                    Stage::Compose,
                    format!("ffmpeg timed out after {}s", self.timeout.as_secs()),
                ));
            }
        }

        match tokio::fs::metadata(out).await {
            Ok(meta) if meta.len() > 0 => {}
            _ => {
                return Err(ProductionError::failed(
                    Stage::Compose,
                    format!("ffmpeg produced no output at {}", out.display()),
                ));
            }
        }

        Ok(self.probe_duration(out).await)
    }
}
