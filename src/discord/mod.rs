pub mod client;
pub mod collage;
pub mod color;
pub mod embed;
pub mod error;
pub mod reporter;
pub mod types;

use tracing::{debug, info};

use crate::media::StagedFile;
use crate::models::PostId;
use client::WebhookClient;
use reporter::ErrorReporter;
use types::{Embed, WebhookMessage};

/// Outcome of one fan-out. Partial failure is normal, not an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Sends messages to every URL in a comma separated destination string,
/// reporting each failed target through the [`ErrorReporter`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: WebhookClient,
    reporter: ErrorReporter,
}

impl Dispatcher {
    pub fn new(client: WebhookClient, reporter: ErrorReporter) -> Self {
        Self { client, reporter }
    }

    pub fn reporter(&self) -> &ErrorReporter {
        &self.reporter
    }

    pub async fn send_embed(&self, embed: Embed, post_id: PostId, webhook: &str) -> DeliveryReport {
        if split_targets(webhook).next().is_none() {
            self.reporter
                .report(&format!(
                    "No webhook URL found. Tried to send embed for post {}",
                    post_id
                ))
                .await;
            return DeliveryReport::default();
        }

        debug!(image = ?embed.image_url(), "Sending embed for post {}", post_id);
        let report = self
            .fan_out(webhook, &WebhookMessage::embed(embed), &[])
            .await;
        if report.delivered > 0 {
            info!(
                delivered = report.delivered,
                failed = report.failed,
                "Webhook posted for post https://twitter.com/i/status/{}",
                post_id
            );
        }
        report
    }

    pub async fn send_text(&self, message: &str, webhook: &str, files: &[StagedFile]) -> DeliveryReport {
        debug!("Sending message: {}", message);

        if split_targets(webhook).next().is_none() {
            self.reporter
                .report(&format!("No webhook URL found. Tried to send {}", message))
                .await;
            return DeliveryReport::default();
        }

        self.fan_out(webhook, &WebhookMessage::text(message), files)
            .await
    }

    // Targets are tried one after another; a failure never stops the rest.
    async fn fan_out(
        &self,
        webhook: &str,
        message: &WebhookMessage,
        files: &[StagedFile],
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for target in split_targets(webhook) {
            debug!(webhook_url = %target, "Dispatching");
            match self.client.deliver(target, message, files).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    self.reporter
                        .report(&format!("Failed to send to {}: {}", target, e))
                        .await;
                }
            }
        }

        report
    }
}

fn split_targets(webhook: &str) -> impl Iterator<Item = &str> {
    webhook
        .split(',')
        .map(str::trim)
        .filter(|target| !target.is_empty())
}
