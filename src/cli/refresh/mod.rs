//! Refresh command - ask a running server to reload its keys

use std::time::Duration;

use clap::Args;

use crate::config::AppConfig;
use crate::infrastructure::api_key::RefreshClient;
use crate::infrastructure::logging::init_cli_logging;

#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Refresh endpoint; defaults to `refresh.url`, then the local server
    #[arg(long)]
    pub url: Option<String>,
}

pub async fn run(args: RefreshArgs) -> anyhow::Result<()> {
    init_cli_logging();
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    let url = resolve_url(args.url, &config);
    let client = RefreshClient::new(url, Duration::from_secs(config.refresh.timeout_secs.max(1)))?;

    let summary = client.trigger().await?;
    println!(
        "Refreshed {} ({} keys loaded)",
        client.url(),
        summary.keys_loaded
    );

    Ok(())
}

fn resolve_url(flag: Option<String>, config: &AppConfig) -> String {
    flag.or_else(|| config.refresh.url.clone())
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| format!("http://127.0.0.1:{}/refresh", config.server.port))
}
