use async_trait::async_trait;
use tracing::info;
use tts_client::{TtsClient, TtsError, Voice};

use perle_common::file_config::NarrationConfig;

use crate::error::{ProductionError, Result, Stage};

/// Text in, MP3 bytes out.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn narrate(&self, text: &str) -> Result<Vec<u8>>;
}

pub struct TtsNarrator {
    client: Option<TtsClient>,
    voice: Voice,
}

impl TtsNarrator {
    /// `api_key: None` builds a narrator that fails every call with a
    /// configuration error.
    pub fn new(api_key: Option<String>, endpoint: Option<&str>, cfg: &NarrationConfig) -> Self {
        let client = api_key.map(|key| match endpoint {
            Some(ep) => TtsClient::with_endpoint(ep, key),
            None => TtsClient::new(key),
        });
        let mut voice = Voice::new(&cfg.language, cfg.speaking_rate);
        voice.name = cfg.voice.clone();
        Self { client, voice }
    }
}

#[async_trait]
impl Narrator for TtsNarrator {
    async fn narrate(&self, text: &str) -> Result<Vec<u8>> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ProductionError::config(Stage::Narration, "TTS_API_KEY is not set"))?;

        let audio = client
            .synthesize_long(text, &self.voice)
            .await
            .map_err(|e| match e {
                TtsError::Api { status: 401 | 403, message } => {
                    ProductionError::config(Stage::Narration, format!("TTS rejected credentials: {message}"))
                }
                TtsError::EmptyInput => ProductionError::config(Stage::Narration, "nothing to narrate"),
                other => ProductionError::failed(Stage::Narration, other.to_string()),
            })?;

        info!(
            language = %self.voice.language,
            rate = self.voice.speaking_rate,
            bytes = audio.len(),
            "Narration synthesized"
        );
        Ok(audio)
    }
}
