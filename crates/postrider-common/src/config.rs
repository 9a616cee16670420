//! Configuration for Postrider

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Blob storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Message preparation and dispatch configuration
    pub dispatch: DispatchConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

/// Blob storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base path for local filesystem storage
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("/var/lib/postrider/attachments")
}

/// Configuration for message preparation and dispatch.
///
/// Passed explicitly into the services that need it; there is no
/// process-wide settings object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Sender email used when a message does not set one
    pub default_from_email: String,

    /// Sender display name used when a message does not set one
    #[serde(default)]
    pub default_from_name: String,

    /// Maximum subject length; longer subjects are truncated with "..."
    #[serde(default = "default_max_subject_length")]
    pub max_subject_length: usize,

    /// Branding fields merged into every template context
    #[serde(default)]
    pub branding: BrandingConfig,
}

fn default_max_subject_length() -> usize {
    78
}

/// Site-wide presentation defaults available to every template.
///
/// Values set in a message's own template context win on key collision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrandingConfig {
    #[serde(default)]
    pub logo_url: String,

    #[serde(default)]
    pub logo_url_link: String,

    #[serde(default)]
    pub contact_email: String,

    #[serde(default)]
    pub site_name: String,

    #[serde(default)]
    pub company: String,

    #[serde(default)]
    pub company_address: String,

    #[serde(default)]
    pub company_city_state_zip: String,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load() -> crate::Result<Self> {
        let paths = [
            std::path::PathBuf::from("./postrider.toml"),
            std::path::PathBuf::from("/etc/postrider/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(crate::Error::Config(
            "No configuration file found".to_string(),
        ))
    }
}

impl DispatchConfig {
    /// The branding defaults as template context entries
    pub fn branding_context(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        map.insert("logo_url".to_string(), self.branding.logo_url.clone().into());
        map.insert(
            "logo_url_link".to_string(),
            self.branding.logo_url_link.clone().into(),
        );
        map.insert(
            "contact_email".to_string(),
            self.branding.contact_email.clone().into(),
        );
        map.insert("site_name".to_string(), self.branding.site_name.clone().into());
        map.insert("company".to_string(), self.branding.company.clone().into());
        map.insert(
            "company_address".to_string(),
            self.branding.company_address.clone().into(),
        );
        map.insert(
            "company_city_state_zip".to_string(),
            self.branding.company_city_state_zip.clone().into(),
        );
        map
    }
}
