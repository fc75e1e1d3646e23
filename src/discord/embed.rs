use chrono::Utc;

use crate::config::EmbedSettings;
use crate::discord::color::resolve_color;
use crate::discord::types::{Embed, EmbedAuthor, EmbedFooter};
use crate::models::{format_identity, PostEvent};

/// Everything a field rule may look at.
struct EmbedInput<'a> {
    post: &'a PostEvent,
    settings: &'a EmbedSettings,
    resolved_image: Option<&'a str>,
}

type FieldRule = fn(&mut Embed, &EmbedInput<'_>);

// Applied in order; a later image rule overwrites an earlier one.
const FIELD_RULES: &[FieldRule] = &[
    card_image,
    resolved_image,
    override_image,
    thumbnail,
    timestamp,
    footer,
    title,
    author,
    color,
];

/// Build the embed for `post`. `resolved_image` is the collage resolver's pick.
/// Never fails; a missing value just leaves its field unset.
pub fn create_embed(
    post: &PostEvent,
    settings: &EmbedSettings,
    resolved_image: Option<&str>,
) -> Embed {
    let input = EmbedInput {
        post,
        settings,
        resolved_image,
    };

    let mut embed = Embed::new(post.text.clone());
    for rule in FIELD_RULES {
        rule(&mut embed, &input);
    }
    embed
}

fn card_image(embed: &mut Embed, input: &EmbedInput<'_>) {
    if let Some(url) = input.post.card_image() {
        embed.set_image(url);
    }
}

fn resolved_image(embed: &mut Embed, input: &EmbedInput<'_>) {
    if let Some(url) = input.resolved_image.filter(|url| !url.is_empty()) {
        embed.set_image(url);
    }
}

fn override_image(embed: &mut Embed, input: &EmbedInput<'_>) {
    if let Some(url) = &input.settings.image {
        embed.set_image(url.as_str());
    }
}

fn thumbnail(embed: &mut Embed, input: &EmbedInput<'_>) {
    if let Some(url) = &input.settings.thumbnail {
        embed.set_thumbnail(url.as_str());
    }
}

fn timestamp(embed: &mut Embed, input: &EmbedInput<'_>) {
    if input.settings.show_timestamp {
        embed.timestamp = Some(Utc::now().to_rfc3339());
    }
}

fn footer(embed: &mut Embed, input: &EmbedInput<'_>) {
    let settings = input.settings;
    if settings.footer_icon.is_some() || settings.footer_text.is_some() {
        embed.footer = Some(EmbedFooter {
            text: settings.footer_text.clone(),
            icon_url: settings.footer_icon.clone(),
        });
    }
}

// Title always shows who posted, regardless of author overrides.
fn title(embed: &mut Embed, input: &EmbedInput<'_>) {
    if input.settings.use_title {
        embed.title = Some(input.post.identity());
    }
}

fn author(embed: &mut Embed, input: &EmbedInput<'_>) {
    if !input.settings.use_author {
        return;
    }

    let post = input.post;
    let settings = input.settings;
    let display_name = settings.author_name.as_deref().unwrap_or(&post.display_name);

    embed.author = Some(EmbedAuthor {
        name: format_identity(display_name, &post.username),
        url: settings.author_url.clone().unwrap_or_else(|| post.post_url()),
        icon_url: settings
            .author_icon
            .clone()
            .unwrap_or_else(|| post.avatar_url.clone()),
    });
}

fn color(embed: &mut Embed, input: &EmbedInput<'_>) {
    embed.color = resolve_color(input.settings);
}
