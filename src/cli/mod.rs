//! CLI module for Keygate
//!
//! - `serve`: run the verification server
//! - `create` / `list` / `delete`: administer the stored key document
//! - `refresh`: ask a running server to reload

pub mod keys;
pub mod refresh;
pub mod serve;

use clap::{Args, Parser, Subcommand};

use crate::config::AppConfig;

/// Keygate - API key issuance and verification
#[derive(Parser)]
#[command(name = "keygate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the verification server
    Serve,

    /// Create a new API key
    Create(keys::CreateArgs),

    /// List stored API keys
    List(keys::ListArgs),

    /// Delete an API key by ID
    Delete(keys::DeleteArgs),

    /// Trigger a reload on a running server
    Refresh(refresh::RefreshArgs),
}

/// Overrides for the configured storage location
#[derive(Args, Debug, Clone, Default)]
pub struct StorageArgs {
    /// Bucket holding the key document
    #[arg(long)]
    pub bucket: Option<String>,

    /// Object key of the key document
    #[arg(long)]
    pub key: Option<String>,

    /// AWS region
    #[arg(long)]
    pub region: Option<String>,
}

impl StorageArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(bucket) = &self.bucket {
            config.storage.bucket = bucket.clone();
        }
        if let Some(key) = &self.key {
            config.storage.key = key.clone();
        }
        if let Some(region) = &self.region {
            config.storage.region = region.clone();
        }
    }
}

/// Configuration for the admin commands: `.env`, files, environment, then flags
pub fn load_config(storage: &StorageArgs) -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let mut config = AppConfig::load()?;
    storage.apply(&mut config);
    Ok(config)
}
