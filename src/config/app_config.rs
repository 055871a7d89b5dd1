use serde::Deserialize;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub storage: StorageSettings,
    pub refresh: RefreshSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Resolve the caller from the first `X-Forwarded-For` hop when present.
    ///
    /// The header is client-controlled: any caller can claim
    /// `X-Forwarded-For: 127.0.0.1` and pass the loopback check on
    /// `/refresh` and `/health/internal`. Leave this on only when the service
    /// sits behind a reverse proxy that overwrites the header; set it to
    /// `false` when clients reach the listener directly.
    pub trust_forwarded_for: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Where the key document lives and how it is protected at rest
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// `s3` or `memory`
    pub backend: String,
    pub bucket: String,
    pub key: String,
    pub region: String,
    /// S3-compatible endpoint override (MinIO, LocalStack)
    pub endpoint_url: Option<String>,
    /// Storage secret; enables at-rest encryption when set
    pub secret: Option<String>,
    pub timeout_secs: u64,
}

/// Post-write refresh trigger used by the admin commands
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    pub url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            trust_forwarded_for: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: "s3".to_string(),
            bucket: String::new(),
            key: "keys.json".to_string(),
            region: "us-east-1".to_string(),
            endpoint_url: None,
            secret: None,
            timeout_secs: 10,
        }
    }
}

impl std::fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageSettings")
            .field("backend", &self.backend)
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 5,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
