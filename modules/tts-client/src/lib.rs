pub mod error;
pub mod types;

pub use error::{Result, TtsError};

use std::time::Duration;

use base64::Engine as _;
use types::{AudioConfig, SynthesisInput, SynthesizeRequest, SynthesizeResponse, VoiceSelection};

const DEFAULT_ENDPOINT: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

/// Longest text sent in one synthesize call.
pub const MAX_CHUNK_CHARS: usize = 200;

/// Voice parameters for one synthesis.
#[derive(Debug, Clone)]
pub struct Voice {
    /// BCP-47 language code, e.g. `it-IT`.
    pub language: String,
    /// Provider voice name; `None` lets the provider pick one for the language.
    pub name: Option<String>,
    /// 0.25..=4.0, 1.0 is normal speed.
    pub speaking_rate: f32,
}

impl Voice {
    pub fn new(language: &str, speaking_rate: f32) -> Self {
        Self {
            language: language.to_string(),
            name: None,
            speaking_rate: speaking_rate.clamp(0.25, 4.0),
        }
    }
}

pub struct TtsClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl TtsClient {
    pub fn new(api_key: String) -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT, api_key)
    }

    pub fn with_endpoint(endpoint: &str, api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            endpoint: endpoint.to_string(),
            api_key,
        }
    }

    /// Synthesize one chunk of text to MP3 bytes.
    pub async fn synthesize(&self, text: &str, voice: &Voice) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(TtsError::EmptyInput);
        }

        let body = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: &voice.language,
                name: voice.name.as_deref(),
            },
            audio_config: AudioConfig {
                audio_encoding: "MP3",
                speaking_rate: voice.speaking_rate,
            },
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(TtsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: SynthesizeResponse = resp
            .json()
            .await
            .map_err(|e| TtsError::Parse(e.to_string()))?;
        let audio = base64::engine::general_purpose::STANDARD.decode(parsed.audio_content)?;
        Ok(audio)
    }

    /// Synthesize text of any length. The text is split at word boundaries
    /// into chunks of at most [`MAX_CHUNK_CHARS`] and the MP3 outputs are
    /// concatenated in order.
    pub async fn synthesize_long(&self, text: &str, voice: &Voice) -> Result<Vec<u8>> {
        let chunks = split_into_chunks(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(TtsError::EmptyInput);
        }

        let mut audio = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            tracing::debug!(chunk = i, chars = chunk.chars().count(), "Synthesizing chunk");
            audio.extend(self.synthesize(chunk, voice).await?);
        }
        Ok(audio)
    }
}

/// Split `text` into pieces of at most `max_chars` characters, breaking on
/// whitespace. A single word longer than `max_chars` is split by characters.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() { word_len } else { current_len + 1 + word_len };
        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_into_chunks("Ciao a tutti", 200), vec!["Ciao a tutti"]);
    }

    #[test]
    fn chunks_respect_limit_and_keep_words_whole() {
        let text = "uno due tre quattro cinque sei sette";
        let chunks = split_into_chunks(text, 10);
        assert_eq!(chunks, vec!["uno due", "tre", "quattro", "cinque sei", "sette"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }

    #[test]
    fn overlong_word_is_split_by_chars() {
        let chunks = split_into_chunks("a precipitevolissimevolmente b", 8);
        assert_eq!(chunks[0], "a");
        assert_eq!(chunks[1], "precipit");
        assert_eq!(chunks.last().unwrap(), "b");
        assert!(chunks.iter().all(|c| c.chars().count() <= 8));
    }

    #[test]
    fn whitespace_only_yields_nothing() {
        assert!(split_into_chunks("   \n\t ", 50).is_empty());
    }

    #[test]
    fn speaking_rate_is_clamped() {
        assert_eq!(Voice::new("it-IT", 9.0).speaking_rate, 4.0);
        assert_eq!(Voice::new("it-IT", 0.0).speaking_rate, 0.25);
    }

    #[test]
    fn request_uses_camel_case_fields() {
        let req = SynthesizeRequest {
            input: SynthesisInput { text: "Ciao" },
            voice: VoiceSelection { language_code: "it-IT", name: None },
            audio_config: AudioConfig { audio_encoding: "MP3", speaking_rate: 1.1 },
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["voice"]["languageCode"], "it-IT");
        assert_eq!(json["audioConfig"]["audioEncoding"], "MP3");
        assert!(json["voice"].get("name").is_none());
    }
}
