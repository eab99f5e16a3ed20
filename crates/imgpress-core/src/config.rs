//! Configuration module
//!
//! Loads server, staging, folder-cache and backend credential settings from the environment
//! (a `.env` file is honoured when present).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// Common constants
const SERVER_PORT: u16 = 4000;
const FOLDER_REFRESH_INTERVAL_SECS: u64 = 3600;
const REDIRECT_DELAY_MS: u64 = 1000;
const MAX_UPLOAD_SIZE_MB: usize = 50;
const HTTP_CLIENT_TIMEOUT_SECS: u64 = 60;
const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com";

/// Base configuration shared by every component
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub environment: String,
}

/// Cloudinary account credentials
#[derive(Clone)]
pub struct AssetHostCredentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// Base URL of the Cloudinary REST API (overridable for tests and proxies)
    pub api_base: String,
}

impl std::fmt::Debug for AssetHostCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetHostCredentials")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Upload service configuration
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub base: BaseConfig,
    // Backend credentials. Both are optional at startup; the routes that need them fail at
    // request time with a configuration error.
    pub asset_host: Option<AssetHostCredentials>,
    pub azure_connection_string: Option<String>,
    // Local staging
    pub staging_inbound_dir: PathBuf,
    pub staging_outbound_dir: PathBuf,
    // Folder directory cache
    pub folder_snapshot_path: PathBuf,
    pub folder_refresh_interval_secs: u64,
    // Upload behaviour
    pub redirect_delay_ms: u64,
    pub max_upload_size_bytes: usize,
    pub http_client_timeout_secs: u64,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<ServiceConfig>);

impl Config {
    fn inner(&self) -> &ServiceConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = ServiceConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.inner().base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn asset_host(&self) -> Option<&AssetHostCredentials> {
        self.inner().asset_host.as_ref()
    }

    pub fn azure_connection_string(&self) -> Option<&str> {
        self.inner().azure_connection_string.as_deref()
    }

    pub fn staging_inbound_dir(&self) -> &PathBuf {
        &self.inner().staging_inbound_dir
    }

    pub fn staging_outbound_dir(&self) -> &PathBuf {
        &self.inner().staging_outbound_dir
    }

    pub fn folder_snapshot_path(&self) -> &PathBuf {
        &self.inner().folder_snapshot_path
    }

    pub fn folder_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.inner().folder_refresh_interval_secs)
    }

    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.inner().redirect_delay_ms)
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.inner().max_upload_size_bytes
    }

    pub fn http_client_timeout(&self) -> Duration {
        Duration::from_secs(self.inner().http_client_timeout_secs)
    }
}

/// Parse `name` when set, `default` otherwise. A malformed value is an error.
fn env_or<T: FromStr>(name: &str, default: T) -> Result<T, anyhow::Error> {
    match env::var(name) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number, got '{}'", name, v)),
        Err(_) => Ok(default),
    }
}

fn megabytes_to_bytes(mb: usize) -> Result<usize, anyhow::Error> {
    mb.checked_mul(1024 * 1024)
        .ok_or_else(|| anyhow::anyhow!("MAX_UPLOAD_SIZE_MB is too large: {}", mb))
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let base = BaseConfig {
            server_port: env_or("PORT", SERVER_PORT)?,
            environment,
        };

        let asset_host = match (
            non_empty_env("CLOUD_NAME"),
            non_empty_env("API_KEY"),
            non_empty_env("API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(AssetHostCredentials {
                cloud_name,
                api_key,
                api_secret,
                api_base: non_empty_env("CLOUDINARY_API_BASE")
                    .unwrap_or_else(|| CLOUDINARY_API_BASE.to_string()),
            }),
            (None, None, None) => None,
            _ => {
                return Err(anyhow::anyhow!(
                    "CLOUD_NAME, API_KEY and API_SECRET must be set together"
                ))
            }
        };

        let max_upload_size_mb = env_or("MAX_UPLOAD_SIZE_MB", MAX_UPLOAD_SIZE_MB)?;

        let config = ServiceConfig {
            base,
            asset_host,
            azure_connection_string: non_empty_env("AZURE_STORAGE_CONNECTION_STRING"),
            staging_inbound_dir: non_empty_env("STAGING_INBOUND_DIR")
                .unwrap_or_else(|| "uploads".to_string())
                .into(),
            staging_outbound_dir: non_empty_env("STAGING_OUTBOUND_DIR")
                .unwrap_or_else(|| "after_sharp".to_string())
                .into(),
            folder_snapshot_path: non_empty_env("FOLDER_SNAPSHOT_PATH")
                .unwrap_or_else(|| "folder.json".to_string())
                .into(),
            folder_refresh_interval_secs: env_or(
                "FOLDER_REFRESH_INTERVAL_SECS",
                FOLDER_REFRESH_INTERVAL_SECS,
            )?,
            redirect_delay_ms: env_or("REDIRECT_DELAY_MS", REDIRECT_DELAY_MS)?,
            max_upload_size_bytes: megabytes_to_bytes(max_upload_size_mb)?,
            http_client_timeout_secs: env_or("HTTP_CLIENT_TIMEOUT_SECS", HTTP_CLIENT_TIMEOUT_SECS)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.folder_refresh_interval_secs == 0 {
            return Err(anyhow::anyhow!(
                "FOLDER_REFRESH_INTERVAL_SECS must be greater than zero"
            ));
        }

        if self.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be greater than zero"));
        }

        if self.staging_inbound_dir == self.staging_outbound_dir {
            return Err(anyhow::anyhow!(
                "STAGING_INBOUND_DIR and STAGING_OUTBOUND_DIR must be different directories"
            ));
        }

        if let Some(conn) = &self.azure_connection_string {
            if !conn.contains("AccountName=") || !conn.contains("AccountKey=") {
                return Err(anyhow::anyhow!(
                    "AZURE_STORAGE_CONNECTION_STRING must contain AccountName and AccountKey"
                ));
            }
        }

        Ok(())
    }
}
