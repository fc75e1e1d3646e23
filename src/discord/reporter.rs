use tracing::{debug, error, warn};

use crate::config::Config;
use crate::discord::client::WebhookClient;
use crate::discord::types::WebhookMessage;

/// Logs operational errors and, when enabled, forwards them to the error webhook.
///
/// Delivery goes through [`WebhookClient::deliver`] only, so a failure to reach
/// the error webhook is logged and never reported again.
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    client: WebhookClient,
    destination: Option<String>,
    enabled: bool,
}

impl ErrorReporter {
    pub fn new(client: WebhookClient, config: &Config) -> Self {
        Self {
            client,
            destination: config.error_webhook.clone(),
            enabled: config.send_errors,
        }
    }

    /// Report to the configured error webhook.
    pub async fn report(&self, message: &str) {
        self.report_to(message, self.destination.as_deref()).await
    }

    /// Report to an explicit destination. The destination is used as-is, not split on commas.
    pub async fn report_to(&self, message: &str, destination: Option<&str>) {
        error!("Got an error: {}", message);

        if !self.enabled {
            debug!("Tried to send error webhook but SEND_ERRORS is not enabled");
            return;
        }

        let Some(destination) = destination.filter(|d| !d.is_empty()) else {
            warn!("SEND_ERRORS is enabled but no error webhook is configured");
            return;
        };

        let result = self
            .client
            .deliver(destination, &WebhookMessage::text(message), &[])
            .await;

        if let Err(e) = result {
            error!(webhook_url = %destination, "Failed to send error webhook: {}", e);
        }
    }
}
