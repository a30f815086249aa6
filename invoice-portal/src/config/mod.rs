use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub backend: BackendSettings,
    pub storage: StorageSettings,
    #[serde(default)]
    pub telemetry: core_config::Config,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Sessions expire after this much inactivity.
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
    /// Set in production behind HTTPS.
    #[serde(default)]
    pub secure_cookies: bool,
}

fn default_session_ttl_hours() -> i64 {
    24
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendSettings {
    /// Base URL of the invoice/vendor/audit REST backend.
    pub url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    #[serde(default = "default_local_path")]
    pub local_path: String,
    /// Where locally stored objects are served from (the portal's `/files` route).
    #[serde(default)]
    pub public_url: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
}

fn default_local_path() -> String {
    "storage".to_string()
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    S3,
}

impl StorageSettings {
    /// Bucket and region, both required for the S3 backend.
    pub fn s3_location(&self) -> Result<(String, String), AppError> {
        match (&self.s3_bucket, &self.s3_region) {
            (Some(bucket), Some(region)) if !bucket.is_empty() && !region.is_empty() => {
                Ok((bucket.clone(), region.clone()))
            }
            _ => Err(AppError::ConfigError(anyhow::anyhow!(
                "storage.s3_bucket and storage.s3_region are required for the s3 backend"
            ))),
        }
    }

    pub fn local_public_url(&self) -> Result<String, AppError> {
        self.public_url.clone().ok_or_else(|| {
            AppError::ConfigError(anyhow::anyhow!(
                "storage.public_url is required for the local backend"
            ))
        })
    }
}

pub fn get_configuration() -> Result<Settings, AppError> {
    let base_path = std::env::current_dir()?;

    // Works from the workspace root and from inside the crate directory.
    let configuration_directory = if base_path.ends_with("invoice-portal") {
        base_path.join("config")
    } else {
        base_path.join("invoice-portal").join("config")
    };

    core_config::load_layered(&configuration_directory)
}
