use async_trait::async_trait;
use tracing::info;

use perle_common::ContentItem;
use perle_studio::ArtifactHandle;

use super::{build_caption, ensure_artifact, DeliveryChannel, DeliveryError, DeliveryResult};

/// Logs what would have been posted.
pub struct DryRunChannel {
    hashtags: Vec<String>,
}

impl DryRunChannel {
    pub fn new(hashtags: Vec<String>) -> Self {
        Self { hashtags }
    }
}

#[async_trait]
impl DeliveryChannel for DryRunChannel {
    async fn deliver(
        &self,
        artifact: &ArtifactHandle,
        item: &ContentItem,
    ) -> Result<DeliveryResult, DeliveryError> {
        ensure_artifact(&artifact.path)?;

        let file = artifact
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let caption = build_caption(item, &self.hashtags);

        info!(item_id = %item.id, file = %file, caption = %caption, "Dry run: not posting");
        Ok(DeliveryResult::delivered(format!("dry-run:{file}")))
    }

    fn name(&self) -> &str {
        "dry-run"
    }
}
