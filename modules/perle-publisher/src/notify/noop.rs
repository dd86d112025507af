use async_trait::async_trait;

use super::backend::NotifyBackend;
use crate::workflow::CycleReport;

/// Used when no alert webhook is configured.
pub struct NoopBackend;

#[async_trait]
impl NotifyBackend for NoopBackend {
    async fn send_published(&self, _report: &CycleReport) -> anyhow::Result<()> {
        Ok(())
    }

    async fn send_failure(&self, _report: &CycleReport) -> anyhow::Result<()> {
        Ok(())
    }
}
