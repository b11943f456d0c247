//! Tool settings
//!
//! Loaded from an optional TOML file overlaid by environment variables,
//! e.g. `ACCESSOPS__AZURE__CLIENT_SECRET=...` or `ACCESSOPS__DEVOPS__ORGANIZATION=contoso`.

use std::fmt;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{ConfigError, Result};

pub const DEFAULT_SETTINGS_FILE: &str = "accessops.toml";
pub const ENV_PREFIX: &str = "ACCESSOPS";

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub azure: AzureSettings,
    pub devops: DevOpsSettings,
    pub logging: LoggingSettings,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureSettings {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub authority_host: String,
    pub management_endpoint: String,
    pub graph_endpoint: String,
    pub request_timeout_secs: u64,
}

impl Default for AzureSettings {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            authority_host: "https://login.microsoftonline.com".into(),
            management_endpoint: "https://management.azure.com".into(),
            graph_endpoint: "https://graph.microsoft.com".into(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DevOpsSettings {
    pub organization: String,
    pub base_url: String,
    /// Used instead of an Entra ID token when set
    pub personal_access_token: Option<String>,
}

impl Default for DevOpsSettings {
    fn default() -> Self {
        Self {
            organization: String::new(),
            base_url: "https://dev.azure.com".into(),
            personal_access_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// Secrets never reach log output.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("azure", &self.azure)
            .field("devops", &self.devops)
            .field("logging", &self.logging)
            .finish()
    }
}

impl fmt::Debug for AzureSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureSettings")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &mask(&self.client_secret))
            .field("authority_host", &self.authority_host)
            .field("management_endpoint", &self.management_endpoint)
            .field("graph_endpoint", &self.graph_endpoint)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl fmt::Debug for DevOpsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevOpsSettings")
            .field("organization", &self.organization)
            .field("base_url", &self.base_url)
            .field(
                "personal_access_token",
                &self.personal_access_token.as_deref().map(mask),
            )
            .finish()
    }
}

/// Replace a secret with a fixed marker, keeping only whether it is set
pub fn mask(secret: &str) -> &'static str {
    if secret.is_empty() { "(not set)" } else { "********" }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("azure.tenant_id", &self.azure.tenant_id),
            ("azure.client_id", &self.azure.client_id),
            ("azure.client_secret", &self.azure.client_secret),
            ("devops.organization", &self.devops.organization),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::validation(format!("{key} must be set")));
            }
        }

        let urls = [
            ("azure.authority_host", &self.azure.authority_host),
            ("azure.management_endpoint", &self.azure.management_endpoint),
            ("azure.graph_endpoint", &self.azure.graph_endpoint),
            ("devops.base_url", &self.devops.base_url),
        ];
        for (key, value) in urls {
            Url::parse(value)
                .map_err(|e| ConfigError::validation(format!("{key} is not a valid URL: {e}")))?;
        }

        if self.azure.request_timeout_secs == 0 {
            return Err(ConfigError::validation(
                "azure.request_timeout_secs must be > 0",
            ));
        }

        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(ConfigError::validation(format!(
                "logging.level must be one of {valid_levels:?}"
            )));
        }
        Ok(())
    }
}

/// Load settings from `path` (or `accessops.toml` when present) and the environment.
///
/// Does not validate: commands that never reach Azure can run without credentials.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let mut builder = Config::builder();
    match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::settings(format!(
                    "settings file not found: {}",
                    p.display()
                )));
            }
            builder = builder.add_source(File::from(p.to_path_buf()));
        }
        None => {
            let default_path = PathBuf::from(DEFAULT_SETTINGS_FILE);
            if default_path.exists() {
                builder = builder.add_source(File::from(default_path));
            }
        }
    }
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .separator("__"),
    );
    let cfg = builder
        .build()
        .map_err(|e| ConfigError::settings(format!("config build error: {e}")))?;
    cfg.try_deserialize()
        .map_err(|e| ConfigError::settings(format!("config deserialize error: {e}")))
}
