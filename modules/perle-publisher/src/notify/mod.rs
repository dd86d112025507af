pub mod backend;
pub mod noop;
pub mod webhook;

use tracing::info;

use backend::NotifyBackend;
use noop::NoopBackend;
use webhook::WebhookBackend;

/// Webhook backend when `alert_webhook_url` is set, otherwise a no-op.
pub fn from_url(alert_webhook_url: Option<&str>) -> Box<dyn NotifyBackend> {
    match alert_webhook_url {
        Some(url) => {
            info!("Operator alerts enabled");
            Box::new(WebhookBackend::new(url.to_string()))
        }
        None => {
            info!("No ALERT_WEBHOOK_URL set, operator alerts disabled");
            Box::new(NoopBackend)
        }
    }
}
