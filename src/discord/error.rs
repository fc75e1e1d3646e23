//! Webhook delivery errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("got {status} from webhook, response: {body}")]
    Status { status: u16, body: String },

    #[error("still rate limited after {attempts} attempts")]
    RateLimitExhausted { attempts: u32 },

    #[error("request serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("could not read attachment {path}: {source}")]
    Attachment {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
