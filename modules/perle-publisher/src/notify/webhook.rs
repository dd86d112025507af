use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use super::backend::NotifyBackend;
use crate::workflow::{CycleOutcome, CycleReport, CycleState};

/// Incoming-webhook backend (Slack-compatible `{"text": ...}` payload).
pub struct WebhookBackend {
    webhook_url: String,
    http: reqwest::Client,
}

impl WebhookBackend {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            http: reqwest::Client::new(),
        }
    }

    async fn post(&self, text: String) -> anyhow::Result<()> {
        let resp = self
            .http
            .post(&self.webhook_url)
            .json(&json!({ "text": text, "unfurl_links": false }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Alert webhook returned non-success");
            anyhow::bail!("alert webhook returned {status}");
        }
        Ok(())
    }
}

pub(crate) fn published_text(report: &CycleReport) -> String {
    format!(
        ":white_check_mark: *Perla published*\n*Item:* `{}`\n*Reference:* {}\n_{}_",
        report.item_id.as_ref().map(|i| i.as_str()).unwrap_or("?"),
        report.reference.as_deref().unwrap_or("?"),
        report.stats,
    )
}

pub(crate) fn failure_text(report: &CycleReport) -> String {
    let item = report.item_id.as_ref().map(|i| i.as_str()).unwrap_or("?");
    let (state, error) = match &report.outcome {
        CycleOutcome::Failed { state, error } => (Some(*state), error.as_str()),
        _ => (None, "unknown"),
    };

    if state == Some(CycleState::Publishing) {
        // Already posted; the next cycle may post it again.
        return format!(
            ":warning: *Perla posted but not recorded*\n*Item:* `{}`\n*Reference:* {}\n*Error:* {}",
            item,
            report.reference.as_deref().unwrap_or("?"),
            error,
        );
    }

    let artifact = report
        .artifact
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "none".to_string());
    format!(
        ":rotating_light: *Perla delivery failed*\n*Item:* `{}`\n*Error:* {}\n*Video kept at:* {}",
        item, error, artifact,
    )
}

#[async_trait]
impl NotifyBackend for WebhookBackend {
    async fn send_published(&self, report: &CycleReport) -> anyhow::Result<()> {
        self.post(published_text(report)).await
    }

    async fn send_failure(&self, report: &CycleReport) -> anyhow::Result<()> {
        self.post(failure_text(report)).await
    }
}
