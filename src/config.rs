use ::config::builder::DefaultState;
use ::config::{ConfigBuilder, Environment};
use anyhow::{bail, Result};
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_COLLAGE_MAKER_URL: &str = "https://twitter.lovinator.space/add";
pub const MAX_WEBHOOKS: usize = 5;

/// Immutable settings snapshot, built once at startup and shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Config {
    /// `WEBHOOK_URL` .. `WEBHOOK_URL5`. Each entry may hold several comma separated URLs.
    pub webhooks: Vec<Option<String>>,
    pub error_webhook: Option<String>,
    pub collage_maker_url: String,
    pub log_level: String,
    pub embed: EmbedSettings,
    pub upload_images: bool,
    pub append_image_links: bool,
    pub send_errors: bool,
    pub use_embed: bool,
    /// Parent of the per-post media staging directories; system temp dir when unset.
    pub staging_dir: Option<PathBuf>,
}

/// Display overrides and toggles consumed by the embed builder.
#[derive(Debug, Clone, Default)]
pub struct EmbedSettings {
    pub color: Option<String>,
    pub randomize_color: bool,
    pub author_name: Option<String>,
    pub author_url: Option<String>,
    pub author_icon: Option<String>,
    pub footer_icon: Option<String>,
    pub footer_text: Option<String>,
    pub image: Option<String>,
    pub thumbnail: Option<String>,
    pub show_timestamp: bool,
    pub use_title: bool,
    pub use_author: bool,
}

// Everything arrives from the environment as text; normalized in `Config::from_raw`.
#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    webhook_url: Option<String>,
    webhook_url2: Option<String>,
    webhook_url3: Option<String>,
    webhook_url4: Option<String>,
    webhook_url5: Option<String>,
    error_webhook: Option<String>,
    twitter_image_collage_api: Option<String>,
    log_level: Option<String>,
    webhook_embed_color: Option<String>,
    webhook_randomize_embed_color: Option<String>,
    webhook_author_name: Option<String>,
    webhook_author_url: Option<String>,
    webhook_author_icon: Option<String>,
    webhook_footer_icon: Option<String>,
    webhook_footer_text: Option<String>,
    webhook_image: Option<String>,
    webhook_thumbnail: Option<String>,
    webhook_show_timestamp: Option<String>,
    use_title: Option<String>,
    use_author: Option<String>,
    upload_images: Option<String>,
    append_image_links: Option<String>,
    send_errors: Option<String>,
    use_embed: Option<String>,
    media_staging_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            webhooks: vec![None; MAX_WEBHOOKS],
            error_webhook: None,
            collage_maker_url: DEFAULT_COLLAGE_MAKER_URL.to_string(),
            log_level: "INFO".to_string(),
            embed: EmbedSettings::default(),
            upload_images: false,
            append_image_links: false,
            send_errors: false,
            use_embed: true,
            staging_dir: None,
        }
    }
}

impl Config {
    /// Load from a `.env` file (if present) and the process environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let builder = ::config::Config::builder().add_source(Environment::default());
        Self::from_builder(builder)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let raw: RawSettings = builder.build()?.try_deserialize()?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSettings) -> Result<Self> {
        let webhooks: Vec<Option<String>> = [
            raw.webhook_url,
            raw.webhook_url2,
            raw.webhook_url3,
            raw.webhook_url4,
            raw.webhook_url5,
        ]
        .into_iter()
        .map(non_empty)
        .collect();

        if webhooks[0].is_none() {
            bail!("WEBHOOK_URL is not set");
        }

        Ok(Config {
            webhooks,
            error_webhook: non_empty(raw.error_webhook),
            collage_maker_url: non_empty(raw.twitter_image_collage_api)
                .unwrap_or_else(|| DEFAULT_COLLAGE_MAKER_URL.to_string()),
            log_level: non_empty(raw.log_level).unwrap_or_else(|| "INFO".to_string()),
            embed: EmbedSettings {
                color: non_empty(raw.webhook_embed_color),
                randomize_color: toggle(raw.webhook_randomize_embed_color, false),
                author_name: non_empty(raw.webhook_author_name),
                author_url: non_empty(raw.webhook_author_url),
                author_icon: non_empty(raw.webhook_author_icon),
                footer_icon: non_empty(raw.webhook_footer_icon),
                footer_text: non_empty(raw.webhook_footer_text),
                image: non_empty(raw.webhook_image),
                thumbnail: non_empty(raw.webhook_thumbnail),
                show_timestamp: toggle(raw.webhook_show_timestamp, false),
                use_title: toggle(raw.use_title, false),
                use_author: toggle(raw.use_author, false),
            },
            upload_images: toggle(raw.upload_images, false),
            append_image_links: toggle(raw.append_image_links, false),
            send_errors: toggle(raw.send_errors, false),
            use_embed: toggle(raw.use_embed, true),
            staging_dir: non_empty(raw.media_staging_dir).map(PathBuf::from),
        })
    }

    /// Destination string for a 1-based webhook slot, empty when the slot is unset.
    pub fn webhook(&self, index: usize) -> &str {
        index
            .checked_sub(1)
            .and_then(|i| self.webhooks.get(i))
            .and_then(|w| w.as_deref())
            .unwrap_or("")
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn toggle(value: Option<String>, default: bool) -> bool {
    match non_empty(value) {
        Some(v) => matches!(v.to_lowercase().as_str(), "true" | "1" | "yes" | "on"),
        None => default,
    }
}
