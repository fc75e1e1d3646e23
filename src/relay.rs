use reqwest::Client;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::discord::client::WebhookClient;
use crate::discord::collage::CollageResolver;
use crate::discord::embed::create_embed;
use crate::discord::reporter::ErrorReporter;
use crate::discord::{DeliveryReport, Dispatcher};
use crate::media;
use crate::models::PostEvent;

/// Turns one post into webhook notifications.
pub struct Relay {
    config: Arc<Config>,
    http: Client,
    dispatcher: Dispatcher,
    collage: CollageResolver,
}

impl Relay {
    pub fn new(config: Arc<Config>, http: Client) -> Self {
        let client = WebhookClient::new(http.clone());
        let reporter = ErrorReporter::new(client.clone(), &config);
        let collage = CollageResolver::new(http.clone(), config.collage_maker_url.clone());

        Self {
            dispatcher: Dispatcher::new(client, reporter),
            collage,
            http,
            config,
        }
    }

    /// Relay `post` to the 1-based webhook slot `destination`.
    pub async fn relay_post(&self, post: &PostEvent, destination: usize) -> DeliveryReport {
        let webhook = self.config.webhook(destination);
        info!(
            "Relaying post {} from @{} to webhook slot {}",
            post.id, post.username, destination
        );

        if self.config.use_embed {
            self.relay_embed(post, webhook).await
        } else {
            self.relay_text(post, webhook).await
        }
    }

    async fn relay_embed(&self, post: &PostEvent, webhook: &str) -> DeliveryReport {
        let settings = &self.config.embed;

        // Resolved even when a configured image will win, so collage failures still get reported.
        let resolved_image = self
            .collage
            .resolve(&post.media_links, post.id, self.dispatcher.reporter())
            .await;

        let embed = create_embed(post, settings, resolved_image.as_deref());
        self.dispatcher.send_embed(embed, post.id, webhook).await
    }

    async fn relay_text(&self, post: &PostEvent, webhook: &str) -> DeliveryReport {
        let staged = if self.config.upload_images && !post.media_links.is_empty() {
            let staging_dir = self.config.staging_dir.as_deref();
            match media::stage(&self.http, &post.media_links, staging_dir).await {
                Ok(staged) => Some(staged),
                Err(e) => {
                    self.dispatcher
                        .reporter()
                        .report(&format!(
                            "Could not create a staging directory for post {}: {}",
                            post.id, e
                        ))
                        .await;
                    None
                }
            }
        } else {
            None
        };

        let mut message = post.text.clone();
        if self.config.append_image_links {
            for link in &post.media_links {
                message.push('\n');
                message.push_str(link);
            }
        }

        let files = staged.as_ref().map(|s| s.files()).unwrap_or_default();
        let report = self.dispatcher.send_text(&message, webhook, files).await;

        if let Some(staged) = staged {
            staged.release();
        }
        report
    }
}
