//! Key administration commands

use chrono::Utc;
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::AppConfig;
use crate::domain::api_key::{parse_expires_at, parse_metadata, ApiKeyRecord};
use crate::infrastructure::api_key::{ApiKeyService, CreateApiKeyRequest, RefreshClient, RefreshSummary};
use crate::infrastructure::logging::init_cli_logging;
use crate::infrastructure::side_call::SideCallOutcome;

use super::{load_config, StorageArgs};

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Human-readable label for the key
    #[arg(long)]
    pub name: String,

    /// JSON object returned with every successful verification
    #[arg(long)]
    pub metadata: Option<String>,

    /// RFC 3339 expiry, e.g. 2030-01-01T00:00:00Z
    #[arg(long)]
    pub expires_at: Option<String>,

    /// Refresh endpoint to poke after the write; overrides `refresh.url`
    #[arg(long)]
    pub refresh_url: Option<String>,

    #[command(flatten)]
    pub storage: StorageArgs,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub storage: StorageArgs,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// ID of the key to delete
    pub id: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Refresh endpoint to poke after the write; overrides `refresh.url`
    #[arg(long)]
    pub refresh_url: Option<String>,

    #[command(flatten)]
    pub storage: StorageArgs,
}

pub async fn create(args: CreateArgs) -> anyhow::Result<()> {
    init_cli_logging();

    // reject bad input before touching storage
    let mut request = CreateApiKeyRequest::new(args.name);
    if let Some(raw) = args.metadata.as_deref() {
        request = request.with_metadata(parse_metadata(raw)?);
    }
    if let Some(raw) = args.expires_at.as_deref() {
        request = request.with_expires_at(parse_expires_at(raw)?);
    }

    let service = build_service(&args.storage, args.refresh_url.as_deref()).await?;
    let created = service.create(request).await?;
    let record = &created.record;

    println!("Created API key");
    println!("  id:      {}", record.id);
    println!("  name:    {}", record.name);
    println!("  secret:  {}", record.secret);
    if let Some(expires_at) = &record.expires_at {
        println!("  expires: {}", expires_at);
    }
    println!();
    println!("Store the secret now. It will not be shown again.");

    report_refresh(created.refresh.as_ref());
    Ok(())
}

pub async fn list(args: ListArgs) -> anyhow::Result<()> {
    init_cli_logging();

    let service = build_service(&args.storage, None).await?;
    let records = service.list().await?;

    if records.is_empty() {
        println!("No API keys found");
        return Ok(());
    }

    println!("{}", format_header());
    for record in &records {
        println!("{}", format_row(record));
    }
    println!("\n{} key(s)", records.len());

    Ok(())
}

pub async fn delete(args: DeleteArgs) -> anyhow::Result<()> {
    init_cli_logging();

    let service = build_service(&args.storage, args.refresh_url.as_deref()).await?;

    let Some(record) = service.get(&args.id).await? else {
        anyhow::bail!("API key not found: {}", args.id);
    };

    if !args.yes && !confirm(&format!("Delete API key {} ({})?", record.id, record.name)).await? {
        println!("Aborted");
        return Ok(());
    }

    let deleted = service.delete(&args.id).await?;
    println!("Deleted API key {} ({})", deleted.record.id, deleted.record.name);

    report_refresh(deleted.refresh.as_ref());
    Ok(())
}

async fn build_service(
    storage: &StorageArgs,
    refresh_url: Option<&str>,
) -> anyhow::Result<ApiKeyService> {
    let mut config = load_config(storage)?;
    override_refresh_url(&mut config, refresh_url);

    let store = crate::create_key_store(&config.storage).await?;
    let refresh_client = RefreshClient::from_settings(&config.refresh)?;

    Ok(ApiKeyService::new(store).with_refresh_client(refresh_client))
}

fn override_refresh_url(config: &mut AppConfig, refresh_url: Option<&str>) {
    if let Some(url) = refresh_url {
        config.refresh.url = Some(url.to_string());
    }
}

/// Refresh problems are warnings; the write already succeeded
fn report_refresh(outcome: Option<&SideCallOutcome<RefreshSummary>>) {
    match outcome {
        Some(SideCallOutcome::Completed(summary)) => {
            println!("Server refreshed ({} keys loaded)", summary.keys_loaded);
        }
        Some(other) => {
            if let Some(warning) = other.warning() {
                eprintln!("Warning: server refresh failed: {}", warning);
                eprintln!("Run `keygate refresh` once the server is reachable.");
            }
        }
        None => {}
    }
}

async fn confirm(prompt: &str) -> anyhow::Result<bool> {
    println!("{} [y/N]", prompt);

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;

    Ok(is_affirmative(&line))
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn format_header() -> String {
    format!(
        "{:<28} {:<24} {:<28} {:<28} {}",
        "ID", "NAME", "CREATED", "EXPIRES", "STATUS"
    )
}

fn format_row(record: &ApiKeyRecord) -> String {
    let status = if record.is_expired_at(Utc::now()) {
        "expired"
    } else {
        "active"
    };

    let created = match (record.created(), record.created_at.as_deref()) {
        (Some(ts), _) => ts.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        (None, Some(raw)) => raw.to_string(),
        (None, None) => "-".to_string(),
    };

    format!(
        "{:<28} {:<24} {:<28} {:<28} {}",
        record.id,
        truncate(&record.name, 24),
        created,
        record.expires_at.as_deref().unwrap_or("never"),
        status
    )
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        let kept: String = value.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_is_affirmative() {
        assert!(is_affirmative("y\n"));
        assert!(is_affirmative(" YES "));
        assert!(!is_affirmative("\n"));
        assert!(!is_affirmative("no"));
    }

    #[test]
    fn test_format_row_marks_expired() {
        let expired =
            ApiKeyRecord::new("key_1", "sec_1", "old").with_expires_at(Utc::now() - Duration::days(1));
        let active = ApiKeyRecord::new("key_2", "sec_2", "new");

        assert!(format_row(&expired).ends_with("expired"));
        let row = format_row(&active);
        assert!(row.contains("never"));
        assert!(row.ends_with("active"));
        assert!(!row.contains("sec_2"));
    }

    #[test]
    fn test_refresh_url_flag_overrides_config() {
        let mut config = AppConfig::default();
        config.refresh.url = Some("http://configured/refresh".to_string());

        override_refresh_url(&mut config, None);
        assert_eq!(config.refresh.url.as_deref(), Some("http://configured/refresh"));

        override_refresh_url(&mut config, Some("http://flag:8080/refresh"));
        let client = RefreshClient::from_settings(&config.refresh).unwrap().unwrap();
        assert_eq!(client.url(), "http://flag:8080/refresh");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a-very-long-key-name", 10), "a-very-...");
    }
}
