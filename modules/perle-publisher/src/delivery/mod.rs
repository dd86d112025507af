//! Delivery channels: where a finished video gets posted.

pub mod dry_run;
pub mod telegram;

pub use dry_run::DryRunChannel;
pub use telegram::TelegramChannel;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use perle_common::ContentItem;
use perle_studio::ArtifactHandle;

/// Outcome of one delivery attempt. `success = false` covers ordinary
/// failures (network, remote rejection) and carries the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    pub success: bool,
    pub reference: Option<String>,
    pub reason: Option<String>,
}

impl DeliveryResult {
    pub fn delivered(reference: impl Into<String>) -> Self {
        Self {
            success: true,
            reference: Some(reference.into()),
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reference: None,
            reason: Some(reason.into()),
        }
    }
}

/// Problems no retry will fix.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Delivery not configured: {0}")]
    Configuration(String),

    #[error("Delivery precondition failed: {0}")]
    Precondition(String),
}

#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn deliver(
        &self,
        artifact: &ArtifactHandle,
        item: &ContentItem,
    ) -> Result<DeliveryResult, DeliveryError>;

    fn name(&self) -> &str;
}

#[async_trait]
impl<T: DeliveryChannel + ?Sized> DeliveryChannel for Arc<T> {
    async fn deliver(
        &self,
        artifact: &ArtifactHandle,
        item: &ContentItem,
    ) -> Result<DeliveryResult, DeliveryError> {
        (**self).deliver(artifact, item).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Post text: the perla, the author line, then hashtags.
pub fn build_caption(item: &ContentItem, hashtags: &[String]) -> String {
    let mut caption = item.text.clone();
    if let Some(author) = item.author.as_deref() {
        caption.push_str("\n\n— ");
        caption.push_str(author);
    }
    let tags: Vec<&str> = hashtags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if !tags.is_empty() {
        caption.push_str("\n\n");
        caption.push_str(&tags.join(" "));
    }
    caption
}

pub(crate) fn ensure_artifact(path: &Path) -> Result<(), DeliveryError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        Ok(_) => Err(DeliveryError::Precondition(format!(
            "artifact {} is empty",
            path.display()
        ))),
        Err(e) => Err(DeliveryError::Precondition(format!(
            "artifact {} is missing: {e}",
            path.display()
        ))),
    }
}
