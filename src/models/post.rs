use serde::{Deserialize, Serialize};
use std::fmt;

// NewType pattern for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub u64);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One post to relay, as handed over by the ingestion side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostEvent {
    pub id: PostId,
    pub username: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub media_links: Vec<String>,
    #[serde(default)]
    pub card_image: Option<String>,
}

impl PostEvent {
    pub fn post_url(&self) -> String {
        format!("https://twitter.com/{}/status/{}", self.username, self.id)
    }

    /// Card image, treating an empty string the same as no card.
    pub fn card_image(&self) -> Option<&str> {
        self.card_image.as_deref().filter(|url| !url.is_empty())
    }

    /// `Display Name (@username)` as shown in titles and author blocks.
    pub fn identity(&self) -> String {
        format_identity(&self.display_name, &self.username)
    }
}

/// A post as read from the input stream, tagged with the webhook slot it belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundPost {
    #[serde(flatten)]
    pub post: PostEvent,
    #[serde(default = "default_destination")]
    pub destination: usize,
}

fn default_destination() -> usize {
    1
}

pub fn format_identity(display_name: &str, username: &str) -> String {
    format!("{} (@{})", display_name, username)
}
