//! Microsoft Graph: service principals and API permissions

use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::Result;
use crate::auth::Credential;
use crate::http::{RestClient, odata_literal};
use crate::models::{AppRoleAssignment, OAuth2Grant, ResourceApi, ServicePrincipal};

const API_VERSION: &str = "v1.0";

/// Directory operations used by reconciliation
#[async_trait]
pub trait Directory: Send + Sync {
    async fn service_principal_by_app_id(&self, app_id: Uuid) -> Result<Option<ServicePrincipal>>;

    /// Resource application by app id (when `api` is a guid) or display name
    async fn find_resource_api(&self, api: &str) -> Result<Option<ResourceApi>>;

    async fn app_role_assignments(&self, principal_id: Uuid) -> Result<Vec<AppRoleAssignment>>;

    async fn assign_app_role(
        &self,
        principal_id: Uuid,
        resource_id: Uuid,
        app_role_id: Uuid,
    ) -> Result<()>;

    /// Tenant-wide (`AllPrincipals`) delegated grant from `client_id` to `resource_id`
    async fn oauth2_grant(&self, client_id: Uuid, resource_id: Uuid)
    -> Result<Option<OAuth2Grant>>;

    async fn create_oauth2_grant(
        &self,
        client_id: Uuid,
        resource_id: Uuid,
        scopes: &[String],
    ) -> Result<()>;

    async fn update_oauth2_grant(&self, grant_id: &str, scopes: &[String]) -> Result<()>;
}

pub struct GraphClient {
    rest: RestClient,
}

impl GraphClient {
    pub fn new(http: reqwest::Client, endpoint: &str, credential: Credential) -> Self {
        Self {
            rest: RestClient::new(http, endpoint, credential),
        }
    }

    fn url(&self, path: &str) -> String {
        self.rest.url(&format!("/{API_VERSION}{path}"))
    }
}

#[async_trait]
impl Directory for GraphClient {
    async fn service_principal_by_app_id(&self, app_id: Uuid) -> Result<Option<ServicePrincipal>> {
        let url = self.url("/servicePrincipals");
        let filter = format!("appId eq {}", odata_literal(&app_id.to_string()));
        let found: Vec<ServicePrincipal> = self
            .rest
            .list(&url, &[("$filter", filter.as_str())])
            .await?;
        Ok(found.into_iter().next())
    }

    async fn find_resource_api(&self, api: &str) -> Result<Option<ResourceApi>> {
        let url = self.url("/servicePrincipals");
        let filter = match Uuid::parse_str(api) {
            Ok(app_id) => format!("appId eq {}", odata_literal(&app_id.to_string())),
            Err(_) => format!("displayName eq {}", odata_literal(api)),
        };
        let found: Vec<ResourceApi> = self
            .rest
            .list(&url, &[("$filter", filter.as_str())])
            .await?;
        Ok(found.into_iter().next())
    }

    async fn app_role_assignments(&self, principal_id: Uuid) -> Result<Vec<AppRoleAssignment>> {
        let url = self.url(&format!("/servicePrincipals/{principal_id}/appRoleAssignments"));
        self.rest.list(&url, &[]).await
    }

    async fn assign_app_role(
        &self,
        principal_id: Uuid,
        resource_id: Uuid,
        app_role_id: Uuid,
    ) -> Result<()> {
        let url = self.url(&format!("/servicePrincipals/{principal_id}/appRoleAssignments"));
        let body = json!({
            "principalId": principal_id,
            "resourceId": resource_id,
            "appRoleId": app_role_id
        });
        let _: serde_json::Value = self.rest.send_json(Method::POST, &url, &[], &body).await?;
        info!(%principal_id, %resource_id, %app_role_id, "Assigned app role");
        Ok(())
    }

    async fn oauth2_grant(
        &self,
        client_id: Uuid,
        resource_id: Uuid,
    ) -> Result<Option<OAuth2Grant>> {
        let url = self.url("/oauth2PermissionGrants");
        let filter = format!(
            "clientId eq {} and resourceId eq {}",
            odata_literal(&client_id.to_string()),
            odata_literal(&resource_id.to_string())
        );
        let grants: Vec<OAuth2Grant> = self
            .rest
            .list(&url, &[("$filter", filter.as_str())])
            .await?;
        Ok(grants
            .into_iter()
            .find(|g| g.consent_type == "AllPrincipals"))
    }

    async fn create_oauth2_grant(
        &self,
        client_id: Uuid,
        resource_id: Uuid,
        scopes: &[String],
    ) -> Result<()> {
        let url = self.url("/oauth2PermissionGrants");
        let body = json!({
            "clientId": client_id,
            "consentType": "AllPrincipals",
            "resourceId": resource_id,
            "scope": scopes.join(" ")
        });
        let _: serde_json::Value = self.rest.send_json(Method::POST, &url, &[], &body).await?;
        info!(
            %client_id,
            %resource_id,
            scope = %scopes.join(" "),
            "Created delegated permission grant"
        );
        Ok(())
    }

    async fn update_oauth2_grant(&self, grant_id: &str, scopes: &[String]) -> Result<()> {
        let url = self.url(&format!("/oauth2PermissionGrants/{grant_id}"));
        let body = json!({ "scope": scopes.join(" ") });
        let _: serde_json::Value = self.rest.send_json(Method::PATCH, &url, &[], &body).await?;
        info!(grant_id, scope = %scopes.join(" "), "Updated delegated permission grant");
        Ok(())
    }
}
