use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::discord::reporter::ErrorReporter;
use crate::models::PostId;
use crate::utils::http::AUX_TIMEOUT;

#[derive(Debug, Deserialize)]
struct CollageResponse {
    url: String,
}

/// Chooses the one image to embed for a post, asking the collage service to
/// merge multiple images when needed.
#[derive(Debug, Clone)]
pub struct CollageResolver {
    client: Client,
    collage_url: String,
}

impl CollageResolver {
    pub fn new(client: Client, collage_url: impl Into<String>) -> Self {
        Self {
            client,
            collage_url: collage_url.into(),
        }
    }

    /// No links gives no image, one link is used verbatim, more than one goes
    /// through the collage service. Every failure falls back to the first link.
    pub async fn resolve(
        &self,
        media_links: &[String],
        post_id: PostId,
        reporter: &ErrorReporter,
    ) -> Option<String> {
        match media_links {
            [] => None,
            [only] => Some(only.clone()),
            [first, ..] => match self.fetch_collage(post_id).await {
                Ok(url) => {
                    if self.image_exists(&url).await {
                        info!("Using collage {} for post {}", url, post_id);
                        Some(url)
                    } else {
                        reporter
                            .report(&format!(
                                "Image {} does not exist but was returned by {} for post {}. \
                                 The collage service looks broken.",
                                url, self.collage_url, post_id
                            ))
                            .await;
                        Some(first.clone())
                    }
                }
                Err(message) => {
                    reporter.report(&message).await;
                    Some(first.clone())
                }
            },
        }
    }

    async fn fetch_collage(&self, post_id: PostId) -> Result<String, String> {
        debug!("Requesting collage from {} for post {}", self.collage_url, post_id);

        let response = self
            .client
            .get(&self.collage_url)
            .query(&[("tweet_id", post_id.to_string())])
            .timeout(AUX_TIMEOUT)
            .send()
            .await
            .map_err(|e| format!("Failed to reach {} for post {}: {}", self.collage_url, post_id, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!(
                "Got {} from {} for post {}",
                status.as_u16(),
                self.collage_url,
                post_id
            ));
        }

        response
            .json::<CollageResponse>()
            .await
            .map(|body| body.url)
            .map_err(|e| {
                format!(
                    "Could not parse response from {} for post {}: {}",
                    self.collage_url, post_id, e
                )
            })
    }

    async fn image_exists(&self, url: &str) -> bool {
        match self.client.head(url).timeout(AUX_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("HEAD {} failed: {}", url, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::discord::client::WebhookClient;
    use crate::utils::http::create_client;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn links(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("https://img/{}.jpg", i)).collect()
    }

    fn silent_reporter() -> ErrorReporter {
        ErrorReporter::new(WebhookClient::new(create_client().unwrap()), &Config::default())
    }

    fn resolver(server: &MockServer) -> CollageResolver {
        CollageResolver::new(create_client().unwrap(), format!("{}/add", server.uri()))
    }

    #[tokio::test]
    async fn test_no_links_no_image() {
        let server = MockServer::start().await;
        let image = resolver(&server).resolve(&[], PostId(1), &silent_reporter()).await;
        assert_eq!(image, None);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_link_verbatim() {
        let server = MockServer::start().await;
        let image = resolver(&server)
            .resolve(&links(1), PostId(1), &silent_reporter())
            .await;
        assert_eq!(image.as_deref(), Some("https://img/1.jpg"));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_collage_used_when_reachable() {
        let server = MockServer::start().await;
        let collage = format!("{}/collage/7.png", server.uri());

        Mock::given(method("GET"))
            .and(path("/add"))
            .and(query_param("tweet_id", "7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"url": collage})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/collage/7.png"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let image = resolver(&server)
            .resolve(&links(3), PostId(7), &silent_reporter())
            .await;
        assert_eq!(image, Some(collage));
    }

    #[tokio::test]
    async fn test_collage_error_falls_back_and_reports() {
        let server = MockServer::start().await;
        let errors = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/add"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&errors)
            .await;

        let config = Config {
            error_webhook: Some(errors.uri()),
            send_errors: true,
            ..Default::default()
        };
        let reporter = ErrorReporter::new(WebhookClient::new(create_client().unwrap()), &config);

        let image = resolver(&server).resolve(&links(2), PostId(9), &reporter).await;
        assert_eq!(image.as_deref(), Some("https://img/1.jpg"));

        let sent = errors.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&sent[0].body).unwrap();
        assert!(body["content"].as_str().unwrap().contains("Got 503"));
    }

    #[tokio::test]
    async fn test_broken_collage_image_falls_back() {
        let server = MockServer::start().await;
        let collage = format!("{}/collage/missing.png", server.uri());

        Mock::given(method("GET"))
            .and(path("/add"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"url": collage})))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let image = resolver(&server)
            .resolve(&links(2), PostId(3), &silent_reporter())
            .await;
        assert_eq!(image.as_deref(), Some("https://img/1.jpg"));
    }

    #[tokio::test]
    async fn test_unparseable_collage_body_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let image = resolver(&server)
            .resolve(&links(4), PostId(5), &silent_reporter())
            .await;
        assert_eq!(image.as_deref(), Some("https://img/1.jpg"));
    }
}
