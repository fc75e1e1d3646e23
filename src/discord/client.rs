//! Single-destination webhook delivery with rate limit handling

use reqwest::header::RETRY_AFTER;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::discord::error::WebhookError;
use crate::discord::types::{RateLimitResponse, WebhookMessage};
use crate::media::StagedFile;

const MAX_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);
const MAX_RETRY_AFTER_SECS: f64 = 300.0;

/// Delivers one message to one URL. Never reports errors on its own; callers decide.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: Client,
}

impl WebhookClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Post `message` to `url`, attaching `files` as multipart uploads when present.
    /// HTTP 429 is retried after the advertised delay.
    pub async fn deliver(
        &self,
        url: &str,
        message: &WebhookMessage,
        files: &[StagedFile],
    ) -> Result<(), WebhookError> {
        let attachments = read_attachments(files).await?;
        let payload = serde_json::to_string(message)?;

        let mut attempts = 0;
        loop {
            attempts += 1;
            debug!(webhook_url = %url, attempt = attempts, "Posting webhook");

            let request = self.client.post(url);
            let request = if attachments.is_empty() {
                request
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(payload.clone())
            } else {
                request.multipart(build_form(&payload, &attachments))
            };

            let response = request.send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempts >= MAX_ATTEMPTS {
                    return Err(WebhookError::RateLimitExhausted { attempts });
                }
                let delay = retry_delay(response).await;
                warn!(
                    webhook_url = %url,
                    retry_after_ms = delay.as_millis() as u64,
                    attempt = attempts,
                    "Rate limited, waiting before retry"
                );
                sleep(delay).await;
                continue;
            }

            if status.is_success() {
                return Ok(());
            }

            let body = response.text().await.unwrap_or_default();
            return Err(WebhookError::Status {
                status: status.as_u16(),
                body,
            });
        }
    }
}

async fn read_attachments(files: &[StagedFile]) -> Result<Vec<(String, Vec<u8>)>, WebhookError> {
    let mut attachments = Vec::with_capacity(files.len());
    for file in files {
        let bytes = tokio::fs::read(&file.path)
            .await
            .map_err(|source| WebhookError::Attachment {
                path: file.path.display().to_string(),
                source,
            })?;
        attachments.push((file.filename.clone(), bytes));
    }
    Ok(attachments)
}

fn build_form(payload: &str, attachments: &[(String, Vec<u8>)]) -> Form {
    attachments.iter().enumerate().fold(
        Form::new()
            .percent_encode_noop()
            .text("payload_json", payload.to_string()),
        |form, (i, (filename, bytes))| {
            form.part(
                format!("files[{}]", i),
                Part::bytes(bytes.clone()).file_name(filename.clone()),
            )
        },
    )
}

/// Delay from the `Retry-After` header or the JSON `retry_after` field, in seconds.
async fn retry_delay(response: Response) -> Duration {
    let header_delay = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok());

    let body_delay = response
        .json::<RateLimitResponse>()
        .await
        .ok()
        .and_then(|body| body.retry_after);

    body_delay
        .or(header_delay)
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| Duration::from_secs_f64(secs.min(MAX_RETRY_AFTER_SECS)))
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discord::types::Embed;
    use crate::utils::http::create_client;
    use wiremock::matchers::{body_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> WebhookClient {
        WebhookClient::new(create_client().unwrap())
    }

    #[tokio::test]
    async fn test_deliver_json_embed() {
        let server = MockServer::start().await;
        let message = WebhookMessage::embed(Embed::new("hello"));

        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_json(serde_json::json!({"embeds": [{"description": "hello", "color": 0}]})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let result = client()
            .deliver(&format!("{}/hook", server.uri()), &message, &[])
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_deliver_reports_status_and_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Unknown Webhook"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client()
            .deliver(&server.uri(), &WebhookMessage::text("hi"), &[])
            .await
            .unwrap_err();

        match err {
            WebhookError::Status { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "Unknown Webhook");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(serde_json::json!({"message": "slow down", "retry_after": 0.01})),
            )
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let result = client()
            .deliver(&server.uri(), &WebhookMessage::text("hi"), &[])
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_rate_limit_gives_up() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .expect(u64::from(MAX_ATTEMPTS))
            .mount(&server)
            .await;

        let err = client()
            .deliver(&server.uri(), &WebhookMessage::text("hi"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::RateLimitExhausted { attempts } if attempts == MAX_ATTEMPTS));
    }

    #[tokio::test]
    async fn test_attachments_sent_as_multipart() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("cat.jpg");
        std::fs::write(&file_path, b"meow").unwrap();
        let files = vec![StagedFile {
            filename: "cat.jpg".to_string(),
            path: file_path,
        }];

        Mock::given(method("POST"))
            .and(header_exists("content-type"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client()
            .deliver(&server.uri(), &WebhookMessage::text("look"), &files)
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let content_type = requests[0].headers.get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data"));
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("name=\"payload_json\""));
        assert!(body.contains("filename=\"cat.jpg\""));
        assert!(body.contains("meow"));
    }

    #[tokio::test]
    async fn test_missing_attachment_fails_before_sending() {
        let files = vec![StagedFile {
            filename: "gone.jpg".to_string(),
            path: std::path::PathBuf::from("/nonexistent/gone.jpg"),
        }];

        let err = client()
            .deliver("http://127.0.0.1:9/", &WebhookMessage::text("x"), &files)
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::Attachment { .. }));
    }
}
