use anyhow::Result;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// Timeout for collage lookups, image existence checks and media downloads.
pub const AUX_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared client. Webhook posts run without a client-wide timeout; auxiliary
/// calls set `AUX_TIMEOUT` per request.
pub fn create_client() -> Result<Client> {
    let client = ClientBuilder::new()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(6)
        .build()?;

    Ok(client)
}
