use rand::Rng;
use tracing::error;

use crate::config::EmbedSettings;

/// Twitter blue, used whenever no valid color is configured.
pub const DEFAULT_COLOR: u32 = 0x1DA1F2;
pub const MAX_COLOR: u32 = 0xFFFFFF;

/// Pick the embed accent color. Fixed color beats randomization, which beats the default.
pub fn resolve_color(settings: &EmbedSettings) -> u32 {
    if let Some(color) = &settings.color {
        return parse_hex_color(color).unwrap_or_else(|| {
            error!("Invalid webhook embed color {}. Using default color.", color);
            DEFAULT_COLOR
        });
    }

    if settings.randomize_color {
        return rand::thread_rng().gen_range(0..=MAX_COLOR);
    }

    DEFAULT_COLOR
}

/// Parse `#RRGGBB`. Anything else is rejected.
fn parse_hex_color(color: &str) -> Option<u32> {
    let hex = color.strip_prefix('#')?;
    if color.len() != 7 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}
