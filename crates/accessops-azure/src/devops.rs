//! Azure DevOps: projects and Azure Resource Manager service connections

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};
use tracing::info;
use url::Url;
use uuid::Uuid;

use crate::auth::Credential;
use crate::http::RestClient;
use crate::models::{Project, ServiceEndpoint};
use crate::{AzureError, Result};

const API_VERSION: &str = "7.1";

/// Desired state of an `azurerm` service connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRequest {
    pub name: String,
    pub description: Option<String>,
    pub project: Project,
    pub tenant_id: String,
    pub subscription_id: Uuid,
    pub subscription_name: String,
    pub resource_group: Option<String>,
}

impl EndpointRequest {
    /// Authorization scope when the connection is narrowed to a resource group
    pub fn scope(&self) -> Option<String> {
        self.resource_group
            .as_ref()
            .map(|rg| format!("/subscriptions/{}/resourcegroups/{rg}", self.subscription_id))
    }

    /// Fields of `existing` that differ from this request
    pub fn differences(&self, existing: &ServiceEndpoint) -> Vec<&'static str> {
        let mut diff = Vec::new();
        let existing_desc = existing.description.as_deref().unwrap_or("");
        if self.description.as_deref().unwrap_or("") != existing_desc {
            diff.push("description");
        }
        let existing_sub = existing
            .data_str("subscriptionId")
            .and_then(|s| Uuid::parse_str(s).ok());
        if existing_sub != Some(self.subscription_id) {
            diff.push("subscriptionId");
        }
        if existing.data_str("subscriptionName") != Some(self.subscription_name.as_str()) {
            diff.push("subscriptionName");
        }
        let wanted_scope = self.scope();
        let existing_scope = existing.authorization_scope().map(str::to_ascii_lowercase);
        if wanted_scope.map(|s| s.to_ascii_lowercase()) != existing_scope {
            diff.push("scope");
        }
        diff
    }

    /// Request body for create (no id) and update (with the existing endpoint's id)
    pub fn to_body(&self, existing: Option<&ServiceEndpoint>) -> Value {
        let description = self.description.clone().unwrap_or_default();

        let mut parameters = serde_json::Map::new();
        parameters.insert("tenantid".into(), json!(self.tenant_id));
        if let Some(scope) = self.scope() {
            parameters.insert("scope".into(), json!(scope));
        }
        // Keep the provisioned principal on update so DevOps does not create another one
        if let Some(app_id) = existing.and_then(|e| e.service_principal_app_id()) {
            parameters.insert("serviceprincipalid".into(), json!(app_id));
        }

        let mut body = json!({
            "name": self.name,
            "type": "azurerm",
            "url": "https://management.azure.com/",
            "description": description,
            "owner": "library",
            "isShared": false,
            "authorization": {
                "scheme": "ServicePrincipal",
                "parameters": parameters
            },
            "data": {
                "environment": "AzureCloud",
                "scopeLevel": "Subscription",
                "subscriptionId": self.subscription_id,
                "subscriptionName": self.subscription_name,
                "creationMode": "Automatic"
            },
            "serviceEndpointProjectReferences": [{
                "projectReference": {
                    "id": self.project.id,
                    "name": self.project.name
                },
                "name": self.name,
                "description": description
            }]
        });
        if let Some(existing) = existing {
            body["id"] = json!(existing.id);
        }
        body
    }
}

/// Azure DevOps operations used by reconciliation
#[async_trait]
pub trait ServiceEndpoints: Send + Sync {
    async fn project(&self, name: &str) -> Result<Option<Project>>;

    async fn find_endpoint(&self, project: &str, name: &str) -> Result<Option<ServiceEndpoint>>;

    async fn create_endpoint(&self, request: &EndpointRequest) -> Result<ServiceEndpoint>;

    async fn update_endpoint(
        &self,
        existing: &ServiceEndpoint,
        request: &EndpointRequest,
    ) -> Result<ServiceEndpoint>;
}

pub struct DevOpsClient {
    rest: RestClient,
    organization: String,
}

impl DevOpsClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        organization: &str,
        credential: Credential,
    ) -> Self {
        Self {
            rest: RestClient::new(http, base_url, credential),
            organization: organization.to_string(),
        }
    }

    /// `{base}/{organization}/{segments...}` with each segment percent-encoded
    fn org_url(&self, segments: &[&str]) -> Result<String> {
        let mut url = Url::parse(self.rest.base_url())
            .map_err(|e| AzureError::url(format!("{}: {e}", self.rest.base_url())))?;
        url.path_segments_mut()
            .map_err(|_| AzureError::url(format!("{} cannot be a base", self.rest.base_url())))?
            .pop_if_empty()
            .push(&self.organization)
            .extend(segments);
        Ok(url.to_string())
    }
}

#[async_trait]
impl ServiceEndpoints for DevOpsClient {
    async fn project(&self, name: &str) -> Result<Option<Project>> {
        let url = self.org_url(&["_apis", "projects", name])?;
        self.rest
            .get_optional(&url, &[("api-version", API_VERSION)])
            .await
    }

    async fn find_endpoint(&self, project: &str, name: &str) -> Result<Option<ServiceEndpoint>> {
        let url = self.org_url(&[project, "_apis", "serviceendpoint", "endpoints"])?;
        let found: Vec<ServiceEndpoint> = self
            .rest
            .list(&url, &[("endpointNames", name), ("api-version", API_VERSION)])
            .await?;
        Ok(found.into_iter().find(|e| e.name.eq_ignore_ascii_case(name)))
    }

    async fn create_endpoint(&self, request: &EndpointRequest) -> Result<ServiceEndpoint> {
        let url = self.org_url(&["_apis", "serviceendpoint", "endpoints"])?;
        let created: ServiceEndpoint = self
            .rest
            .send_json(
                Method::POST,
                &url,
                &[("api-version", API_VERSION)],
                &request.to_body(None),
            )
            .await?;
        info!(connection = %request.name, id = %created.id, "Created service connection");
        Ok(created)
    }

    async fn update_endpoint(
        &self,
        existing: &ServiceEndpoint,
        request: &EndpointRequest,
    ) -> Result<ServiceEndpoint> {
        let id = existing.id.to_string();
        let url = self.org_url(&["_apis", "serviceendpoint", "endpoints", id.as_str()])?;
        let updated: ServiceEndpoint = self
            .rest
            .send_json(
                Method::PUT,
                &url,
                &[("api-version", API_VERSION)],
                &request.to_body(Some(existing)),
            )
            .await?;
        info!(connection = %request.name, id = %updated.id, "Updated service connection");
        Ok(updated)
    }
}
