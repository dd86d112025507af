//! Production wiring: configuration in, ready-to-run [`Workflow`] out.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use perle_common::{Config, DeliveryKind, FileConfig, SourceKind};
use perle_sources::{
    BrowserlessFetcher, ContentSource, DocumentRules, DocumentSource, HttpFetcher, PageFetcher,
    TabularSource,
};
use perle_store::ContentStore;
use perle_studio::{
    ArtifactProducer, CardRenderer, CardStyle, DisabledRenderer, FfmpegComposer, RetryPolicy,
    StillRenderer, TtsNarrator, VideoStudio,
};

use crate::delivery::{DeliveryChannel, DryRunChannel, TelegramChannel};
use crate::notify;
use crate::workflow::Workflow;

pub fn build_store(config: &Config) -> Arc<ContentStore> {
    Arc::new(ContentStore::new(config.store_path()))
}

pub fn build_source(config: &Config, file: &FileConfig) -> Result<Box<dyn ContentSource>> {
    match config.source_kind {
        SourceKind::Tabular => {
            let url = config
                .sheet_csv_url
                .as_deref()
                .context("SHEET_CSV_URL is required for the tabular source")?;
            let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new()?);
            Ok(Box::new(TabularSource::new(fetcher, url, file.source.delimiter)))
        }
        SourceKind::Document => {
            let url = config
                .scrape_url
                .as_deref()
                .context("SCRAPE_URL is required for the document source")?;
            let fetcher: Arc<dyn PageFetcher> = match config.browserless_url.as_deref() {
                Some(base) => Arc::new(BrowserlessFetcher::new(
                    base,
                    config.browserless_token.as_deref(),
                    file.source.wait_for.clone(),
                )?),
                None => Arc::new(HttpFetcher::new()?),
            };
            Ok(Box::new(DocumentSource::new(
                fetcher,
                url,
                DocumentRules::from(&file.source),
            )))
        }
    }
}

/// A missing font or TTS key does not stop startup; cycles fail at the
/// matching production stage until it is fixed.
pub fn build_producer(config: &Config, file: &FileConfig) -> Result<Box<dyn ArtifactProducer>> {
    let style = CardStyle::from_config(&file.video)?;
    let renderer: Arc<dyn StillRenderer> = match config.font_path.as_deref() {
        Some(path) => match CardRenderer::from_font_file(path, style) {
            Ok(r) => Arc::new(r),
            Err(e) => {
                warn!(error = %e, "Font unusable, rendering disabled");
                Arc::new(DisabledRenderer::new(e.to_string()))
            }
        },
        None => {
            warn!("FONT_PATH not set, rendering disabled");
            Arc::new(DisabledRenderer::new("FONT_PATH is not set"))
        }
    };

    let narrator = TtsNarrator::new(
        config.tts_api_key.clone(),
        config.tts_endpoint.as_deref(),
        &file.narration,
    );
    let composer = FfmpegComposer::new(&config.ffmpeg_bin, &config.ffprobe_bin, &file.video);

    Ok(Box::new(
        VideoStudio::builder()
            .narrator(Arc::new(narrator))
            .renderer(renderer)
            .composer(Arc::new(composer))
            .output_dir(config.videos_dir())
            .work_dir(config.work_dir())
            .retry(RetryPolicy::new(file.narration.max_attempts))
            .build(),
    ))
}

pub fn build_channel(config: &Config, file: &FileConfig) -> Box<dyn DeliveryChannel> {
    let hashtags = file.caption.hashtags.clone();
    match config.delivery_kind {
        DeliveryKind::Telegram => Box::new(TelegramChannel::new(
            config.telegram_bot_token.clone(),
            config.telegram_chat_id.clone(),
            hashtags,
            (file.video.width, file.video.height),
        )),
        DeliveryKind::DryRun => {
            info!("Dry-run delivery: nothing will be posted");
            Box::new(DryRunChannel::new(hashtags))
        }
    }
}

pub fn build_workflow(config: &Config, file: &FileConfig) -> Result<Workflow> {
    Ok(Workflow::builder()
        .source(build_source(config, file)?)
        .store(build_store(config))
        .producer(build_producer(config, file)?)
        .channel(build_channel(config, file))
        .notifier(notify::from_url(config.alert_webhook_url.as_deref()))
        .window(file.selection.window)
        .build())
}
