pub mod error;
pub mod types;

pub use error::{Result, TelegramError};
pub use types::{Chat, Message, User};

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use types::ApiResponse;

const BASE_URL: &str = "https://api.telegram.org";

/// Bot API limit for media captions, in characters.
pub const MAX_CAPTION_CHARS: usize = 1024;

/// Optional fields for `sendVideo`.
#[derive(Debug, Clone, Default)]
pub struct VideoOptions {
    pub caption: Option<String>,
    pub duration_secs: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub supports_streaming: bool,
}

pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(token: String) -> Self {
        Self::with_base_url(BASE_URL, token)
    }

    /// Point the client at a different API host (self-hosted Bot API server, tests).
    pub fn with_base_url(base_url: &str, token: String) -> Self {
        // Uploads of a few MB can be slow on constrained links.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(180))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    /// Check the token by asking who the bot is.
    pub async fn get_me(&self) -> Result<User> {
        let resp = self.client.get(self.method_url("getMe")).send().await?;
        Self::unwrap_response(resp).await
    }

    /// Upload a local video file to `chat_id`.
    pub async fn send_video(
        &self,
        chat_id: &str,
        path: &Path,
        options: &VideoOptions,
    ) -> Result<Message> {
        let bytes = tokio::fs::read(path).await.map_err(|e| TelegramError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());

        tracing::info!(chat_id, file = %file_name, bytes = bytes.len(), "Uploading video to Telegram");

        let video = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("video/mp4")?;

        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("video", video);

        if let Some(ref caption) = options.caption {
            form = form.text("caption", truncate_caption(caption));
        }
        if let Some(duration) = options.duration_secs {
            form = form.text("duration", duration.to_string());
        }
        if let Some(width) = options.width {
            form = form.text("width", width.to_string());
        }
        if let Some(height) = options.height {
            form = form.text("height", height.to_string());
        }
        if options.supports_streaming {
            form = form.text("supports_streaming", "true");
        }

        let resp = self
            .client
            .post(self.method_url("sendVideo"))
            .multipart(form)
            .send()
            .await?;

        Self::unwrap_response(resp).await
    }

    async fn unwrap_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        let body = resp.text().await?;

        let parsed: ApiResponse<T> = match serde_json::from_str(&body) {
            Ok(p) => p,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => {
                return Err(TelegramError::Api {
                    code: status.as_u16(),
                    description: body,
                })
            }
        };

        match (parsed.ok, parsed.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => Err(TelegramError::Parse(
                "response marked ok but carried no result".to_string(),
            )),
            (false, _) => Err(TelegramError::Api {
                code: parsed.error_code.unwrap_or(status.as_u16()),
                description: parsed.description.unwrap_or_default(),
            }),
        }
    }
}

/// Cut a caption to the Bot API limit on a char boundary, marking the cut with an ellipsis.
pub fn truncate_caption(caption: &str) -> String {
    if caption.chars().count() <= MAX_CAPTION_CHARS {
        return caption.to_string();
    }
    let mut out: String = caption.chars().take(MAX_CAPTION_CHARS - 1).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_caption_untouched() {
        assert_eq!(truncate_caption("Buongiorno"), "Buongiorno");
    }

    #[test]
    fn long_caption_cut_to_limit() {
        let long = "è".repeat(MAX_CAPTION_CHARS + 50);
        let cut = truncate_caption(&long);
        assert_eq!(cut.chars().count(), MAX_CAPTION_CHARS);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn method_url_embeds_token() {
        let client = TelegramClient::with_base_url("http://localhost:8081/", "123:abc".into());
        assert_eq!(
            client.method_url("sendVideo"),
            "http://localhost:8081/bot123:abc/sendVideo"
        );
    }

    #[test]
    fn error_envelope_deserializes() {
        let body = r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#;
        let parsed: ApiResponse<Message> = serde_json::from_str(body).unwrap();
        assert!(!parsed.ok);
        assert_eq!(parsed.error_code, Some(400));
        assert!(parsed.result.is_none());
    }

    #[test]
    fn message_envelope_deserializes() {
        let body = r#"{"ok":true,"result":{"message_id":42,"date":1700000000,
            "chat":{"id":-1001234,"type":"channel","title":"Perle"}}}"#;
        let parsed: ApiResponse<Message> = serde_json::from_str(body).unwrap();
        let msg = parsed.result.unwrap();
        assert_eq!(msg.message_id, 42);
        assert_eq!(msg.chat.id, -1001234);
        assert_eq!(msg.chat.kind, "channel");
    }
}
