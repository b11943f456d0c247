//! Configuration for accessops
//!
//! Two kinds of configuration live here:
//! - [`settings`]: how the tool reaches Azure (tenant, credentials, DevOps
//!   organization, endpoints, logging), loaded from TOML plus environment
//! - [`definitions`]: the declarative service connection files, one mapping of
//!   connection name to definition per YAML file
//!
//! # Definition file layout
//!
//! ```yaml
//! sc-platform-prod:
//!   project: Platform
//!   subscription_id: 3f1c2a4e-0000-4000-8000-000000000001
//!   subscription_name: platform-prod
//!   management_groups:
//!     - name: mg-platform
//!       role: Reader
//!   subscriptions:
//!     - id: 3f1c2a4e-0000-4000-8000-000000000001
//!       role: Contributor
//!       resource_groups:
//!         - name: rg-shared
//!           role: Owner
//!   api_permissions:
//!     - api: Microsoft Graph
//!       application: [Directory.Read.All]
//! ```

pub mod definitions;
pub mod settings;

pub use definitions::{
    ApiPermission, ConnectionFile, ConnectionScope, DefinitionEntry, DefinitionSet,
    ManagementGroupGrant, ResourceGroupGrant, ServiceConnectionDefinition, SubscriptionGrant,
    load_definitions, load_definitions_file,
};
pub use settings::{AzureSettings, DevOpsSettings, LoggingSettings, Settings, load_settings};

use std::path::PathBuf;

/// Error types for configuration operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

impl ConfigError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn settings(msg: impl Into<String>) -> Self {
        Self::Settings(msg.into())
    }
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
