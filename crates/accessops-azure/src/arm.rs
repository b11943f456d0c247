//! Azure Resource Manager: scopes and role-based access control

use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::Credential;
use crate::http::{RestClient, odata_literal};
use crate::models::{ManagementGroup, ResourceGroup, RoleAssignment, RoleDefinition, Subscription};
use crate::{AzureError, Result};

const MANAGEMENT_GROUPS_API: &str = "2020-05-01";
const SUBSCRIPTIONS_API: &str = "2022-12-01";
const RESOURCE_GROUPS_API: &str = "2021-04-01";
const AUTHORIZATION_API: &str = "2022-04-01";

/// Resource Manager operations used by reconciliation
#[async_trait]
pub trait ResourceManager: Send + Sync {
    async fn management_group(&self, name: &str) -> Result<Option<ManagementGroup>>;

    async fn subscription(&self, id: Uuid) -> Result<Option<Subscription>>;

    async fn resource_group(&self, subscription: Uuid, name: &str)
    -> Result<Option<ResourceGroup>>;

    /// Role definition named `role_name` assignable at `scope`
    async fn role_definition(&self, scope: &str, role_name: &str)
    -> Result<Option<RoleDefinition>>;

    /// Assignments held by `principal_id` at exactly `scope` (inherited ones excluded)
    async fn role_assignments(&self, scope: &str, principal_id: Uuid)
    -> Result<Vec<RoleAssignment>>;

    async fn create_role_assignment(
        &self,
        scope: &str,
        role_definition_id: &str,
        principal_id: Uuid,
    ) -> Result<()>;
}

pub struct ArmClient {
    rest: RestClient,
}

impl ArmClient {
    pub fn new(http: reqwest::Client, endpoint: &str, credential: Credential) -> Self {
        Self {
            rest: RestClient::new(http, endpoint, credential),
        }
    }
}

#[async_trait]
impl ResourceManager for ArmClient {
    async fn management_group(&self, name: &str) -> Result<Option<ManagementGroup>> {
        let url = self
            .rest
            .url(&format!("/providers/Microsoft.Management/managementGroups/{name}"));
        self.rest
            .get_optional(&url, &[("api-version", MANAGEMENT_GROUPS_API)])
            .await
    }

    async fn subscription(&self, id: Uuid) -> Result<Option<Subscription>> {
        let url = self.rest.url(&format!("/subscriptions/{id}"));
        self.rest
            .get_optional(&url, &[("api-version", SUBSCRIPTIONS_API)])
            .await
    }

    async fn resource_group(
        &self,
        subscription: Uuid,
        name: &str,
    ) -> Result<Option<ResourceGroup>> {
        let url = self
            .rest
            .url(&format!("/subscriptions/{subscription}/resourcegroups/{name}"));
        self.rest
            .get_optional(&url, &[("api-version", RESOURCE_GROUPS_API)])
            .await
    }

    async fn role_definition(
        &self,
        scope: &str,
        role_name: &str,
    ) -> Result<Option<RoleDefinition>> {
        let url = self.rest.url(&format!(
            "{scope}/providers/Microsoft.Authorization/roleDefinitions"
        ));
        let filter = format!("roleName eq {}", odata_literal(role_name));
        let defs: Vec<RoleDefinition> = self
            .rest
            .list(&url, &[("api-version", AUTHORIZATION_API), ("$filter", filter.as_str())])
            .await?;
        Ok(defs
            .into_iter()
            .find(|d| d.properties.role_name.eq_ignore_ascii_case(role_name)))
    }

    async fn role_assignments(
        &self,
        scope: &str,
        principal_id: Uuid,
    ) -> Result<Vec<RoleAssignment>> {
        let url = self.rest.url(&format!(
            "{scope}/providers/Microsoft.Authorization/roleAssignments"
        ));
        let filter = format!("principalId eq {}", odata_literal(&principal_id.to_string()));
        let all: Vec<RoleAssignment> = self
            .rest
            .list(&url, &[("api-version", AUTHORIZATION_API), ("$filter", filter.as_str())])
            .await?;
        debug!(scope, %principal_id, count = all.len(), "Listed role assignments");
        Ok(all
            .into_iter()
            .filter(|ra| ra.properties.scope.eq_ignore_ascii_case(scope))
            .collect())
    }

    async fn create_role_assignment(
        &self,
        scope: &str,
        role_definition_id: &str,
        principal_id: Uuid,
    ) -> Result<()> {
        let name = Uuid::new_v4();
        let url = self.rest.url(&format!(
            "{scope}/providers/Microsoft.Authorization/roleAssignments/{name}"
        ));
        let body = json!({
            "properties": {
                "roleDefinitionId": role_definition_id,
                "principalId": principal_id,
                "principalType": "ServicePrincipal"
            }
        });
        let created: std::result::Result<serde_json::Value, AzureError> = self
            .rest
            .send_json(Method::PUT, &url, &[("api-version", AUTHORIZATION_API)], &body)
            .await;
        match created {
            Ok(_) => {
                info!(scope, %principal_id, "Created role assignment");
                Ok(())
            }
            // Raced with another writer; the grant is there either way
            Err(AzureError::Api { status: 409, code, .. }) if code == "RoleAssignmentExists" => {
                debug!(scope, %principal_id, "Role assignment already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
