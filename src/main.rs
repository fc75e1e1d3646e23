use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod discord;
mod media;
mod models;
mod relay;
mod utils;

use crate::config::Config;
use crate::models::InboundPost;
use crate::relay::Relay;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::load()?);

    // Initialize logging
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(rust_log.as_deref(), &config.log_level)?)
        .init();

    info!("Starting Discord Twitter Webhooks");

    let client = utils::http::create_client()?;
    let relay = Relay::new(config, client);

    let relayed = relay_lines(BufReader::new(tokio::io::stdin()), &relay).await?;

    info!("Input closed after {} posts, shutting down", relayed);
    Ok(())
}

/// Relay one JSON post per line, strictly in order. Lines that are not valid
/// UTF-8 or not a post are logged and skipped; only read failures end the loop.
async fn relay_lines<R>(mut reader: R, relay: &Relay) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut relayed = 0;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(relayed);
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                error!("Skipping post event that is not valid UTF-8: {}", e);
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<InboundPost>(line) {
            Ok(inbound) => {
                let report = relay.relay_post(&inbound.post, inbound.destination).await;
                relayed += 1;
                if report.failed > 0 {
                    warn!(
                        "Post {} reached {} of {} webhooks",
                        inbound.post.id,
                        report.delivered,
                        report.delivered + report.failed
                    );
                }
            }
            Err(e) => error!("Skipping malformed post event: {}", e),
        }
    }
}

/// `RUST_LOG` wins when set; otherwise `LOG_LEVEL` decides.
fn env_filter(rust_log: Option<&str>, log_level: &str) -> Result<EnvFilter> {
    let directives = match rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => directives.to_string(),
        None => log_directive(log_level),
    };
    Ok(EnvFilter::try_new(directives)?)
}

/// Map `LOG_LEVEL` (CRITICAL, ERROR, WARNING, INFO, DEBUG) to a filter directive.
fn log_directive(level: &str) -> String {
    let level = match level.to_uppercase().as_str() {
        "CRITICAL" | "ERROR" => "error",
        "WARNING" | "WARN" => "warn",
        "DEBUG" => "debug",
        "TRACE" => "trace",
        _ => "info",
    };
    format!("discord_twitter_webhooks={}", level)
}
