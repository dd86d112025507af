use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};
use typed_builder::TypedBuilder;

use perle_common::text::{meaningful_len, sanitize};
use perle_common::{ContentItem, ItemId};

use crate::compose::Composer;
use crate::error::{ProductionError, Result, Stage};
use crate::narration::Narrator;
use crate::render::StillRenderer;
use crate::retry::RetryPolicy;

/// A finished video on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactHandle {
    pub item_id: ItemId,
    pub path: PathBuf,
    pub duration: Option<Duration>,
}

/// Turns a content item into a publishable artifact.
#[async_trait]
pub trait ArtifactProducer: Send + Sync {
    async fn produce(&self, item: &ContentItem) -> Result<ArtifactHandle>;
}

#[async_trait]
impl<T: ArtifactProducer + ?Sized> ArtifactProducer for Arc<T> {
    async fn produce(&self, item: &ContentItem) -> Result<ArtifactHandle> {
        (**self).produce(item).await
    }
}

/// Removes the intermediate files of one production when dropped.
/// The final video is removed too unless it was kept.
struct WorkFiles {
    intermediates: Vec<PathBuf>,
    output: Option<PathBuf>,
}

impl WorkFiles {
    fn new(image: &Path, audio: &Path, output: &Path) -> Self {
        Self {
            intermediates: vec![image.to_path_buf(), audio.to_path_buf()],
            output: Some(output.to_path_buf()),
        }
    }

    fn keep_output(&mut self) {
        self.output = None;
    }
}

impl Drop for WorkFiles {
    fn drop(&mut self) {
        for path in self.intermediates.iter().chain(self.output.iter()) {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove work file"),
            }
        }
    }
}

/// Narration + still card + ffmpeg.
#[derive(TypedBuilder)]
pub struct VideoStudio {
    narrator: Arc<dyn Narrator>,
    renderer: Arc<dyn StillRenderer>,
    composer: Arc<dyn Composer>,
    /// Final videos land here.
    #[builder(setter(into))]
    output_dir: PathBuf,
    /// Image and audio scratch files.
    #[builder(setter(into))]
    work_dir: PathBuf,
    #[builder(default)]
    retry: RetryPolicy,
}

impl VideoStudio {
    fn file_stem(id: &ItemId) -> String {
        format!("{}-{}", id, Utc::now().format("%Y%m%dT%H%M%S"))
    }

    async fn prepare_dirs(&self) -> Result<()> {
        for dir in [&self.output_dir, &self.work_dir] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                ProductionError::failed(Stage::Setup, format!("cannot create {}: {e}", dir.display()))
            })?;
        }
        Ok(())
    }

    async fn narrate_to(&self, text: &str, audio: &Path) -> Result<()> {
        self.retry
            .run("narration", |_| async move {
                let bytes = self.narrator.narrate(text).await?;
                tokio::fs::write(audio, &bytes).await.map_err(|e| {
                    ProductionError::failed(Stage::Narration, format!("cannot write {}: {e}", audio.display()))
                })
            })
            .await
    }

    async fn render_to(&self, text: &str, footer: Option<&str>, image: &Path) -> Result<()> {
        self.retry
            .run("render", |_| {
                let renderer = Arc::clone(&self.renderer);
                let text = text.to_string();
                let footer = footer.map(String::from);
                let image = image.to_path_buf();
                async move {
                    tokio::task::spawn_blocking(move || renderer.render(&text, footer.as_deref(), &image))
                        .await
                        .map_err(|e| ProductionError::failed(Stage::Render, format!("render task failed: {e}")))?
                }
            })
            .await
    }
}

#[async_trait]
impl ArtifactProducer for VideoStudio {
    async fn produce(&self, item: &ContentItem) -> Result<ArtifactHandle> {
        let spoken = sanitize(&item.text);
        if meaningful_len(&spoken) == 0 {
            return Err(ProductionError::failed(
                Stage::Narration,
                "text is empty after sanitizing",
            ));
        }

        self.prepare_dirs().await?;

        let stem = Self::file_stem(&item.id);
        let image = self.work_dir.join(format!("{stem}.png"));
        let audio = self.work_dir.join(format!("{stem}.mp3"));
        let video = self.output_dir.join(format!("{stem}.mp4"));
        let mut work = WorkFiles::new(&image, &audio, &video);

        self.narrate_to(&spoken, &audio).await?;

        let footer = item.attribution();
        self.render_to(&item.text, footer.as_deref(), &image).await?;

        let duration = self.composer.compose(&image, &audio, &video).await?;
        work.keep_output();

        info!(
            item_id = %item.id,
            path = %video.display(),
            duration_secs = duration.map(|d| d.as_secs_f32()),
            "Artifact produced"
        );

        Ok(ArtifactHandle {
            item_id: item.id.clone(),
            path: video,
            duration,
        })
    }
}
