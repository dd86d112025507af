use async_trait::async_trait;
use tracing::{info, warn};

use perle_common::ContentItem;
use perle_studio::ArtifactHandle;
use telegram_client::{TelegramClient, TelegramError, VideoOptions};

use super::{build_caption, ensure_artifact, DeliveryChannel, DeliveryError, DeliveryResult};

/// Posts videos to a Telegram chat or channel through a bot.
pub struct TelegramChannel {
    client: Option<TelegramClient>,
    chat_id: Option<String>,
    hashtags: Vec<String>,
    dimensions: (u32, u32),
}

impl TelegramChannel {
    /// Missing credentials are reported on each delivery, not here.
    pub fn new(
        bot_token: Option<String>,
        chat_id: Option<String>,
        hashtags: Vec<String>,
        dimensions: (u32, u32),
    ) -> Self {
        Self {
            client: bot_token.map(TelegramClient::new),
            chat_id,
            hashtags,
            dimensions,
        }
    }

    pub fn with_client(client: TelegramClient, chat_id: &str, hashtags: Vec<String>) -> Self {
        Self {
            client: Some(client),
            chat_id: Some(chat_id.to_string()),
            hashtags,
            dimensions: (1080, 1920),
        }
    }
}

#[async_trait]
impl DeliveryChannel for TelegramChannel {
    async fn deliver(
        &self,
        artifact: &ArtifactHandle,
        item: &ContentItem,
    ) -> Result<DeliveryResult, DeliveryError> {
        let (client, chat_id) = match (&self.client, self.chat_id.as_deref()) {
            (Some(c), Some(id)) => (c, id),
            (None, _) => return Err(DeliveryError::Configuration("TELEGRAM_BOT_TOKEN is not set".into())),
            (_, None) => return Err(DeliveryError::Configuration("TELEGRAM_CHAT_ID is not set".into())),
        };
        ensure_artifact(&artifact.path)?;

        let options = VideoOptions {
            caption: Some(build_caption(item, &self.hashtags)),
            duration_secs: artifact.duration.map(|d| d.as_secs_f32().ceil() as u32),
            width: Some(self.dimensions.0),
            height: Some(self.dimensions.1),
            supports_streaming: true,
        };

        match client.send_video(chat_id, &artifact.path, &options).await {
            Ok(message) => {
                let reference = format!("telegram:{}:{}", chat_id, message.message_id);
                info!(item_id = %item.id, reference = %reference, "Video posted to Telegram");
                Ok(DeliveryResult::delivered(reference))
            }
            Err(TelegramError::Api { code: 401, description }) => Err(DeliveryError::Configuration(
                format!("bot token rejected: {description}"),
            )),
            Err(TelegramError::Io { path, message }) => Err(DeliveryError::Precondition(format!(
                "cannot read {path}: {message}"
            ))),
            Err(e) => {
                warn!(item_id = %item.id, error = %e, "Telegram delivery failed");
                Ok(DeliveryResult::rejected(e.to_string()))
            }
        }
    }

    fn name(&self) -> &str {
        "telegram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(dir: &std::path::Path, item: &ContentItem) -> ArtifactHandle {
        let path = dir.join("v.mp4");
        std::fs::write(&path, b"mp4").unwrap();
        ArtifactHandle {
            item_id: item.id.clone(),
            path,
            duration: None,
        }
    }

    #[tokio::test]
    async fn missing_token_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let item = ContentItem::candidate("Ciao a tutti quanti").unwrap();
        let channel = TelegramChannel::new(None, Some("@perle".into()), vec![], (1080, 1920));

        let err = channel.deliver(&artifact(dir.path(), &item), &item).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Configuration(ref m) if m.contains("TELEGRAM_BOT_TOKEN")));
    }

    #[tokio::test]
    async fn missing_chat_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let item = ContentItem::candidate("Ciao a tutti quanti").unwrap();
        let channel = TelegramChannel::new(Some("123:abc".into()), None, vec![], (1080, 1920));

        let err = channel.deliver(&artifact(dir.path(), &item), &item).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Configuration(ref m) if m.contains("TELEGRAM_CHAT_ID")));
    }

    #[tokio::test]
    async fn unreachable_api_is_an_ordinary_failure() {
        let dir = tempfile::tempdir().unwrap();
        let item = ContentItem::candidate("Ciao a tutti quanti").unwrap();
        let client = TelegramClient::with_base_url("http://127.0.0.1:9", "123:abc".into());
        let channel = TelegramChannel::with_client(client, "@perle", vec![]);

        let result = channel.deliver(&artifact(dir.path(), &item), &item).await.unwrap();
        assert!(!result.success);
        assert!(result.reason.is_some());
    }
}
