use std::sync::Arc;

use async_trait::async_trait;

use crate::workflow::CycleReport;

/// Operator alerts about cycle outcomes.
#[async_trait]
pub trait NotifyBackend: Send + Sync {
    /// A perla went out.
    async fn send_published(&self, report: &CycleReport) -> anyhow::Result<()>;

    /// Delivery failed; the video is still on disk.
    async fn send_failure(&self, report: &CycleReport) -> anyhow::Result<()>;
}

#[async_trait]
impl<T: NotifyBackend + ?Sized> NotifyBackend for Arc<T> {
    async fn send_published(&self, report: &CycleReport) -> anyhow::Result<()> {
        (**self).send_published(report).await
    }

    async fn send_failure(&self, report: &CycleReport) -> anyhow::Result<()> {
        (**self).send_failure(report).await
    }
}
