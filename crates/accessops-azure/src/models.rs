//! Wire types, trimmed to the fields reconciliation reads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Resource Manager ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementGroup {
    /// Full resource id, also the role assignment scope
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub properties: ManagementGroupProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementGroupProperties {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub subscription_id: Uuid,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDefinition {
    pub id: String,
    pub name: String,
    pub properties: RoleDefinitionProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDefinitionProperties {
    pub role_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignment {
    pub id: String,
    pub name: String,
    pub properties: RoleAssignmentProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignmentProperties {
    pub role_definition_id: String,
    pub principal_id: Uuid,
    pub scope: String,
}

impl RoleAssignment {
    /// Role definition ids come back with different casing and, at
    /// management group scope, without the scope prefix; compare the trailing guid.
    pub fn grants(&self, role_definition_id: &str) -> bool {
        fn tail(id: &str) -> String {
            id.rsplit('/').next().unwrap_or(id).to_ascii_lowercase()
        }
        tail(&self.properties.role_definition_id) == tail(role_definition_id)
    }
}

// --- Microsoft Graph ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePrincipal {
    /// Object id, the principal id used in role assignments
    pub id: Uuid,
    pub app_id: Uuid,
    #[serde(default)]
    pub display_name: String,
    /// Stand-in produced during a dry run when no real principal exists yet
    #[serde(skip)]
    pub placeholder: bool,
}

impl ServicePrincipal {
    pub fn placeholder(display_name: &str) -> Self {
        Self {
            id: Uuid::nil(),
            app_id: Uuid::nil(),
            display_name: display_name.to_string(),
            placeholder: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceApi {
    /// Object id of the resource application's service principal
    pub id: Uuid,
    pub app_id: Uuid,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub app_roles: Vec<AppRole>,
    #[serde(default)]
    pub oauth2_permission_scopes: Vec<PermissionScope>,
}

impl ResourceApi {
    pub fn app_role(&self, value: &str) -> Option<&AppRole> {
        self.app_roles
            .iter()
            .find(|r| r.is_enabled && r.value.as_deref() == Some(value))
    }

    pub fn scope(&self, value: &str) -> Option<&PermissionScope> {
        self.oauth2_permission_scopes
            .iter()
            .find(|s| s.is_enabled && s.value.as_deref() == Some(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRole {
    pub id: Uuid,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default = "enabled")]
    pub is_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionScope {
    pub id: Uuid,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default = "enabled")]
    pub is_enabled: bool,
}

fn enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRoleAssignment {
    pub id: String,
    pub principal_id: Uuid,
    pub resource_id: Uuid,
    pub app_role_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2Grant {
    pub id: String,
    pub client_id: Uuid,
    pub consent_type: String,
    pub resource_id: Uuid,
    #[serde(default)]
    pub scope: String,
}

impl OAuth2Grant {
    pub fn scopes(&self) -> Vec<&str> {
        self.scope.split_whitespace().collect()
    }

    pub fn has_scope(&self, value: &str) -> bool {
        self.scope.split_whitespace().any(|s| s == value)
    }
}

// --- Azure DevOps ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEndpoint {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub endpoint_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub data: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub authorization: Option<EndpointAuthorization>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointAuthorization {
    pub scheme: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl ServiceEndpoint {
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    /// Application id of the backing service principal, once provisioned
    pub fn service_principal_app_id(&self) -> Option<Uuid> {
        self.authorization
            .as_ref()?
            .parameters
            .get("serviceprincipalid")
            .and_then(|id| Uuid::parse_str(id).ok())
    }

    pub fn authorization_scope(&self) -> Option<&str> {
        self.authorization
            .as_ref()?
            .parameters
            .get("scope")
            .map(String::as_str)
    }
}
