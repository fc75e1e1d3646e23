//! Webhook payload types

use serde::{Deserialize, Serialize};

/// Outgoing webhook message, either plain content or a single embed.
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct WebhookMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

impl WebhookMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            embeds: vec![embed],
            ..Default::default()
        }
    }
}

/// Rich embed. Only `description` and `color` are always present.
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct Embed {
    pub description: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedImage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,

    /// ISO8601 timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// 24-bit RGB value
    pub color: u32,
}

impl Embed {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn set_image(&mut self, url: impl Into<String>) {
        self.image = Some(EmbedImage { url: url.into() });
    }

    pub fn set_thumbnail(&mut self, url: impl Into<String>) {
        self.thumbnail = Some(EmbedImage { url: url.into() });
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image.as_ref().map(|image| image.url.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbedAuthor {
    pub name: String,
    pub url: String,
    pub icon_url: String,
}

/// Footer may carry only an icon, only text, or both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbedFooter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

/// Body Discord returns alongside a 429.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitResponse {
    /// Seconds to wait before retrying
    #[serde(default)]
    pub retry_after: Option<f64>,
}
