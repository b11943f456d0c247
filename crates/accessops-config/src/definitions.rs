//! Service connection definition files
//!
//! Every `*.yml` / `*.yaml` file in the definitions directory is a mapping
//! of connection name to [`ServiceConnectionDefinition`]. Files are read in
//! file-name order and entries keep their in-file order, so a run always
//! visits connections in the same sequence.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{ConfigError, Result};

/// One YAML file: connection name -> definition
pub type ConnectionFile = IndexMap<String, ServiceConnectionDefinition>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConnectionDefinition {
    /// Azure DevOps project that owns the connection
    pub project: String,
    #[serde(default)]
    pub description: Option<String>,
    pub subscription_id: Uuid,
    pub subscription_name: String,
    /// Narrows the DevOps-side scope of the connection to one resource group
    #[serde(default)]
    pub resource_group: Option<String>,
    #[serde(default)]
    pub management_groups: Vec<ManagementGroupGrant>,
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionGrant>,
    #[serde(default)]
    pub api_permissions: Vec<ApiPermission>,
}

impl ServiceConnectionDefinition {
    pub fn scope(&self) -> ConnectionScope<'_> {
        match self.resource_group.as_deref() {
            Some(name) => ConnectionScope::ResourceGroup(name),
            None => ConnectionScope::Subscription,
        }
    }
}

/// DevOps-side scope of a service connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionScope<'a> {
    Subscription,
    ResourceGroup(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManagementGroupGrant {
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionGrant {
    pub id: Uuid,
    /// Role at subscription scope; omitted when only resource groups are granted
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub resource_groups: Vec<ResourceGroupGrant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceGroupGrant {
    pub name: String,
    pub role: String,
}

/// Permissions on a resource application (e.g. Microsoft Graph)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiPermission {
    /// Display name or application id of the resource application
    pub api: String,
    /// App role values granted as application permissions
    #[serde(default)]
    pub application: Vec<String>,
    /// OAuth2 scope values granted tenant-wide as delegated permissions
    #[serde(default)]
    pub delegated: Vec<String>,
}

/// A loaded definition together with the file it came from
#[derive(Debug, Clone)]
pub struct DefinitionEntry {
    pub source: PathBuf,
    pub definition: ServiceConnectionDefinition,
}

/// All definitions of a directory, in visiting order
#[derive(Debug, Clone, Default)]
pub struct DefinitionSet {
    entries: IndexMap<String, DefinitionEntry>,
}

impl DefinitionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ServiceConnectionDefinition)> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.as_str(), &entry.definition))
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &DefinitionEntry)> {
        self.entries.iter().map(|(name, e)| (name.as_str(), e))
    }

    /// Add every connection of `file`; a name already present is an error
    pub fn extend_from_file(&mut self, source: &Path, file: ConnectionFile) -> Result<()> {
        for (name, definition) in file {
            if let Some(existing) = self.entries.get(&name) {
                return Err(ConfigError::validation(format!(
                    "service connection '{name}' is defined in both {} and {}",
                    existing.source.display(),
                    source.display()
                )));
            }
            self.entries.insert(
                name,
                DefinitionEntry {
                    source: source.to_path_buf(),
                    definition,
                },
            );
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (name, entry) in &self.entries {
            validate_definition(name, &entry.definition)
                .map_err(|msg| ConfigError::validation(format!("{name}: {msg}")))?;
        }
        Ok(())
    }
}

fn validate_definition(
    name: &str,
    def: &ServiceConnectionDefinition,
) -> std::result::Result<(), String> {
    if name.trim().is_empty() {
        return Err("connection name must not be empty".into());
    }
    if def.project.trim().is_empty() {
        return Err("project must not be empty".into());
    }
    if def.subscription_name.trim().is_empty() {
        return Err("subscription_name must not be empty".into());
    }
    if let Some(rg) = &def.resource_group
        && rg.trim().is_empty()
    {
        return Err("resource_group must not be empty when set".into());
    }

    let mut seen = HashSet::new();
    for mg in &def.management_groups {
        if mg.name.trim().is_empty() || mg.role.trim().is_empty() {
            return Err("management group grants need a name and a role".into());
        }
        let key = format!("mg:{}:{}", mg.name.to_lowercase(), mg.role.to_lowercase());
        if !seen.insert(key) {
            return Err(format!(
                "duplicate role '{}' on management group '{}'",
                mg.role, mg.name
            ));
        }
    }

    for sub in &def.subscriptions {
        if let Some(role) = &sub.role {
            if role.trim().is_empty() {
                return Err(format!("subscription {}: role must not be empty", sub.id));
            }
            let key = format!("sub:{}:{}", sub.id, role.to_lowercase());
            if !seen.insert(key) {
                return Err(format!("duplicate role '{role}' on subscription {}", sub.id));
            }
        } else if sub.resource_groups.is_empty() {
            return Err(format!(
                "subscription {} grants neither a role nor any resource group",
                sub.id
            ));
        }
        for rg in &sub.resource_groups {
            if rg.name.trim().is_empty() || rg.role.trim().is_empty() {
                return Err(format!(
                    "subscription {}: resource group grants need a name and a role",
                    sub.id
                ));
            }
            let key = format!(
                "rg:{}:{}:{}",
                sub.id,
                rg.name.to_lowercase(),
                rg.role.to_lowercase()
            );
            if !seen.insert(key) {
                return Err(format!(
                    "duplicate role '{}' on resource group '{}'",
                    rg.role, rg.name
                ));
            }
        }
    }

    for api in &def.api_permissions {
        if api.api.trim().is_empty() {
            return Err("api permission entries need an api".into());
        }
        if api.application.is_empty() && api.delegated.is_empty() {
            return Err(format!(
                "api '{}' lists neither application nor delegated permissions",
                api.api
            ));
        }
        if !seen.insert(format!("api:{}", api.api.trim().to_lowercase())) {
            return Err(format!("api '{}' is listed more than once", api.api));
        }
        for (kind, values) in [("application", &api.application), ("delegated", &api.delegated)] {
            for value in values {
                if value.trim().is_empty() {
                    return Err(format!("api '{}': permission values must not be empty", api.api));
                }
                let key = format!("{kind}:{}:{}", api.api.to_lowercase(), value.to_lowercase());
                if !seen.insert(key) {
                    return Err(format!(
                        "duplicate {kind} permission '{value}' on api '{}'",
                        api.api
                    ));
                }
            }
        }
    }

    Ok(())
}

fn is_definition_file(path: &Path) -> bool {
    path.is_file()
        && matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yml") | Some("yaml")
        )
}

/// Parse a single definition file
pub fn load_definitions_file(path: &Path) -> Result<ConnectionFile> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    if content.trim().is_empty() {
        debug!("Definition file is empty: {:?}", path);
        return Ok(ConnectionFile::new());
    }
    serde_yaml::from_str(&content).map_err(|e| ConfigError::parse(path, e.to_string()))
}

/// Load and validate every definition file directly inside `dir`
pub fn load_definitions(dir: &Path) -> Result<DefinitionSet> {
    let read_dir = fs::read_dir(dir).map_err(|e| ConfigError::io(dir, e))?;

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in read_dir {
        let path = entry.map_err(|e| ConfigError::io(dir, e))?.path();
        if is_definition_file(&path) {
            files.push(path);
        }
    }
    files.sort();

    let mut set = DefinitionSet::new();
    for path in &files {
        let file = load_definitions_file(path)?;
        debug!(file = %path.display(), connections = file.len(), "Loaded definition file");
        set.extend_from_file(path, file)?;
    }

    if set.is_empty() {
        warn!("No service connection definitions found in {:?}", dir);
    }

    set.validate()?;
    Ok(set)
}
