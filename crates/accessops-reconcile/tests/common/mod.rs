//! In-memory Azure used by the reconciliation tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use accessops_azure::{
    AppRole, AppRoleAssignment, AzureError, Directory, EndpointAuthorization, EndpointRequest,
    ManagementGroup, ManagementGroupProperties, OAuth2Grant, PermissionScope, Project,
    ResourceApi, ResourceGroup, ResourceManager, RoleAssignment, RoleAssignmentProperties,
    RoleDefinition, RoleDefinitionProperties, ServiceEndpoint, ServiceEndpoints, ServicePrincipal,
    Subscription,
};
use accessops_config::{ConnectionFile, DefinitionSet};
use accessops_reconcile::{ReconcileOptions, Reconciler};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

pub const TENANT: &str = "11111111-1111-1111-1111-111111111111";
pub const SUB_PLATFORM: &str = "3f1c2a4e-0000-4000-8000-000000000001";
pub const GRAPH_APP_ID: &str = "00000003-0000-0000-c000-000000000000";
pub const READER: &str = "acdd72a7-3385-48ef-bd42-f606fba81ae7";
pub const CONTRIBUTOR: &str = "b24988ac-6180-42a0-ab88-20f7382dd24c";

#[derive(Default)]
pub struct State {
    pub projects: HashMap<String, Project>,
    pub endpoints: Vec<(String, ServiceEndpoint)>,
    pub principals: Vec<ServicePrincipal>,
    pub management_groups: HashSet<String>,
    pub subscriptions: HashSet<Uuid>,
    pub resource_groups: HashSet<(Uuid, String)>,
    pub roles: HashMap<String, String>,
    pub role_assignments: Vec<RoleAssignment>,
    pub apis: Vec<ResourceApi>,
    pub app_role_assignments: Vec<AppRoleAssignment>,
    pub grants: Vec<OAuth2Grant>,
    /// Every call, reads and writes, in order
    pub calls: Vec<String>,
    /// Every write, in order
    pub writes: Vec<String>,
    /// Operation name that fails with HTTP 500
    pub fail_on: Option<&'static str>,
    /// New connections come back without a principal this many times
    pub provisioning_delay: u32,
}

#[derive(Clone, Default)]
pub struct FakeAzure {
    pub state: Arc<Mutex<State>>,
}

impl FakeAzure {
    /// Tenant with one project, one subscription, one management group,
    /// one resource group, Reader/Contributor roles and Microsoft Graph
    pub fn seeded() -> Self {
        let fake = Self::default();
        {
            let mut s = fake.state.lock().unwrap();
            s.projects.insert(
                "platform".into(),
                Project {
                    id: Uuid::new_v4(),
                    name: "Platform".into(),
                },
            );
            let sub = Uuid::parse_str(SUB_PLATFORM).unwrap();
            s.subscriptions.insert(sub);
            s.management_groups.insert("mg-platform".into());
            s.resource_groups.insert((sub, "rg-shared".into()));
            s.roles.insert("reader".into(), READER.into());
            s.roles.insert("contributor".into(), CONTRIBUTOR.into());
            s.apis.push(ResourceApi {
                id: Uuid::new_v4(),
                app_id: Uuid::parse_str(GRAPH_APP_ID).unwrap(),
                display_name: "Microsoft Graph".into(),
                app_roles: vec![AppRole {
                    id: Uuid::new_v4(),
                    value: Some("Directory.Read.All".into()),
                    is_enabled: true,
                }],
                oauth2_permission_scopes: vec![
                    PermissionScope {
                        id: Uuid::new_v4(),
                        value: Some("User.Read".into()),
                        is_enabled: true,
                    },
                    PermissionScope {
                        id: Uuid::new_v4(),
                        value: Some("openid".into()),
                        is_enabled: true,
                    },
                ],
            });
        }
        fake
    }

    pub fn reconciler(&self, dry_run: bool) -> Reconciler {
        let options = ReconcileOptions::new(TENANT)
            .with_dry_run(dry_run)
            .with_provision_poll(Duration::ZERO, 3);
        Reconciler::new(
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            options,
        )
    }

    pub fn writes(&self) -> Vec<String> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    fn call(&self, op: &'static str, write: bool, detail: String) -> Result<(), AzureError> {
        let mut s = self.state.lock().unwrap();
        let entry = format!("{op} {detail}");
        s.calls.push(entry.clone());
        if write {
            s.writes.push(entry);
        }
        if s.fail_on == Some(op) {
            return Err(AzureError::Api {
                status: 500,
                url: format!("fake://{op}"),
                code: "InternalServerError".into(),
                message: "injected failure".into(),
            });
        }
        Ok(())
    }

    fn endpoint_for(request: &EndpointRequest, id: Uuid, app_id: Option<Uuid>) -> ServiceEndpoint {
        let mut data: BTreeMap<String, serde_json::Value> = BTreeMap::new();
        data.insert("subscriptionId".into(), request.subscription_id.to_string().into());
        data.insert("subscriptionName".into(), request.subscription_name.clone().into());
        let mut parameters = BTreeMap::new();
        parameters.insert("tenantid".to_string(), request.tenant_id.clone());
        if let Some(scope) = request.scope() {
            parameters.insert("scope".to_string(), scope);
        }
        if let Some(app_id) = app_id {
            parameters.insert("serviceprincipalid".to_string(), app_id.to_string());
        }
        ServiceEndpoint {
            id,
            name: request.name.clone(),
            endpoint_type: "azurerm".into(),
            description: request.description.clone(),
            data,
            authorization: Some(EndpointAuthorization {
                scheme: "ServicePrincipal".into(),
                parameters,
            }),
        }
    }

    /// Pre-create a connection together with its principal
    pub fn add_endpoint(&self, project: &str, request: &EndpointRequest) -> ServicePrincipal {
        let sp = ServicePrincipal {
            id: Uuid::new_v4(),
            app_id: Uuid::new_v4(),
            display_name: request.name.clone(),
            placeholder: false,
        };
        let endpoint = Self::endpoint_for(request, Uuid::new_v4(), Some(sp.app_id));
        self.with_state(|s| {
            s.endpoints.push((project.to_lowercase(), endpoint));
            s.principals.push(sp.clone());
        });
        sp
    }

    pub fn project_ref(&self, name: &str) -> Project {
        self.with_state(|s| s.projects[&name.to_lowercase()].clone())
    }
}

#[async_trait]
impl ServiceEndpoints for FakeAzure {
    async fn project(&self, name: &str) -> accessops_azure::Result<Option<Project>> {
        self.call("project", false, name.into())?;
        Ok(self.with_state(|s| s.projects.get(&name.to_lowercase()).cloned()))
    }

    async fn find_endpoint(
        &self,
        project: &str,
        name: &str,
    ) -> accessops_azure::Result<Option<ServiceEndpoint>> {
        self.call("find_endpoint", false, name.into())?;
        Ok(self.with_state(|s| {
            let idx = s
                .endpoints
                .iter()
                .position(|(p, e)| p == &project.to_lowercase() && e.name == name)?;
            // Principal appears once the provisioning delay has run out
            if s.provisioning_delay > 0 {
                s.provisioning_delay -= 1;
                if s.provisioning_delay == 0 {
                    let sp = ServicePrincipal {
                        id: Uuid::new_v4(),
                        app_id: Uuid::new_v4(),
                        display_name: name.into(),
                        placeholder: false,
                    };
                    let ep = &mut s.endpoints[idx].1;
                    if let Some(auth) = ep.authorization.as_mut() {
                        auth.parameters
                            .insert("serviceprincipalid".into(), sp.app_id.to_string());
                    }
                    s.principals.push(sp);
                }
            }
            Some(s.endpoints[idx].1.clone())
        }))
    }

    async fn create_endpoint(
        &self,
        request: &EndpointRequest,
    ) -> accessops_azure::Result<ServiceEndpoint> {
        self.call("create_endpoint", true, request.name.clone())?;
        Ok(self.with_state(|s| {
            let delayed = s.provisioning_delay > 0;
            let app_id = if delayed { None } else { Some(Uuid::new_v4()) };
            let endpoint = Self::endpoint_for(request, Uuid::new_v4(), app_id);
            if let Some(app_id) = app_id {
                s.principals.push(ServicePrincipal {
                    id: Uuid::new_v4(),
                    app_id,
                    display_name: request.name.clone(),
                    placeholder: false,
                });
            }
            s.endpoints
                .push((request.project.name.to_lowercase(), endpoint.clone()));
            endpoint
        }))
    }

    async fn update_endpoint(
        &self,
        existing: &ServiceEndpoint,
        request: &EndpointRequest,
    ) -> accessops_azure::Result<ServiceEndpoint> {
        self.call("update_endpoint", true, request.name.clone())?;
        Ok(self.with_state(|s| {
            let app_id = existing.service_principal_app_id();
            let updated = Self::endpoint_for(request, existing.id, app_id);
            for (_, ep) in s.endpoints.iter_mut() {
                if ep.id == existing.id {
                    *ep = updated.clone();
                }
            }
            updated
        }))
    }
}

#[async_trait]
impl ResourceManager for FakeAzure {
    async fn management_group(
        &self,
        name: &str,
    ) -> accessops_azure::Result<Option<ManagementGroup>> {
        self.call("management_group", false, name.into())?;
        Ok(self.with_state(|s| {
            s.management_groups.contains(name).then(|| ManagementGroup {
                id: format!("/providers/Microsoft.Management/managementGroups/{name}"),
                name: name.into(),
                properties: ManagementGroupProperties::default(),
            })
        }))
    }

    async fn subscription(&self, id: Uuid) -> accessops_azure::Result<Option<Subscription>> {
        self.call("subscription", false, id.to_string())?;
        Ok(self.with_state(|s| {
            s.subscriptions.contains(&id).then(|| Subscription {
                id: format!("/subscriptions/{id}"),
                subscription_id: id,
                display_name: "sub".into(),
                state: Some("Enabled".into()),
            })
        }))
    }

    async fn resource_group(
        &self,
        subscription: Uuid,
        name: &str,
    ) -> accessops_azure::Result<Option<ResourceGroup>> {
        self.call("resource_group", false, name.into())?;
        Ok(self.with_state(|s| {
            s.resource_groups
                .contains(&(subscription, name.to_string()))
                .then(|| ResourceGroup {
                    id: format!("/subscriptions/{subscription}/resourceGroups/{name}"),
                    name: name.into(),
                    location: None,
                })
        }))
    }

    async fn role_definition(
        &self,
        scope: &str,
        role_name: &str,
    ) -> accessops_azure::Result<Option<RoleDefinition>> {
        self.call("role_definition", false, role_name.into())?;
        Ok(self.with_state(|s| {
            s.roles.get(&role_name.to_lowercase()).map(|guid| RoleDefinition {
                id: format!("{scope}/providers/Microsoft.Authorization/roleDefinitions/{guid}"),
                name: guid.clone(),
                properties: RoleDefinitionProperties {
                    role_name: role_name.into(),
                },
            })
        }))
    }

    async fn role_assignments(
        &self,
        scope: &str,
        principal_id: Uuid,
    ) -> accessops_azure::Result<Vec<RoleAssignment>> {
        self.call("role_assignments", false, scope.into())?;
        Ok(self.with_state(|s| {
            s.role_assignments
                .iter()
                .filter(|ra| {
                    ra.properties.scope.eq_ignore_ascii_case(scope)
                        && ra.properties.principal_id == principal_id
                })
                .cloned()
                .collect()
        }))
    }

    async fn create_role_assignment(
        &self,
        scope: &str,
        role_definition_id: &str,
        principal_id: Uuid,
    ) -> accessops_azure::Result<()> {
        let guid = role_definition_id.rsplit('/').next().unwrap_or_default();
        self.call("create_role_assignment", true, format!("{guid} {scope}"))?;
        self.with_state(|s| {
            let name = Uuid::new_v4().to_string();
            s.role_assignments.push(RoleAssignment {
                id: format!("{scope}/providers/Microsoft.Authorization/roleAssignments/{name}"),
                name,
                properties: RoleAssignmentProperties {
                    role_definition_id: role_definition_id.into(),
                    principal_id,
                    scope: scope.into(),
                },
            });
        });
        Ok(())
    }
}

#[async_trait]
impl Directory for FakeAzure {
    async fn service_principal_by_app_id(
        &self,
        app_id: Uuid,
    ) -> accessops_azure::Result<Option<ServicePrincipal>> {
        self.call("service_principal_by_app_id", false, app_id.to_string())?;
        Ok(self.with_state(|s| s.principals.iter().find(|p| p.app_id == app_id).cloned()))
    }

    async fn find_resource_api(&self, api: &str) -> accessops_azure::Result<Option<ResourceApi>> {
        self.call("find_resource_api", false, api.into())?;
        Ok(self.with_state(|s| {
            s.apis
                .iter()
                .find(|a| a.display_name == api || a.app_id.to_string() == api)
                .cloned()
        }))
    }

    async fn app_role_assignments(
        &self,
        principal_id: Uuid,
    ) -> accessops_azure::Result<Vec<AppRoleAssignment>> {
        self.call("app_role_assignments", false, principal_id.to_string())?;
        Ok(self.with_state(|s| {
            s.app_role_assignments
                .iter()
                .filter(|a| a.principal_id == principal_id)
                .cloned()
                .collect()
        }))
    }

    async fn assign_app_role(
        &self,
        principal_id: Uuid,
        resource_id: Uuid,
        app_role_id: Uuid,
    ) -> accessops_azure::Result<()> {
        self.call("assign_app_role", true, app_role_id.to_string())?;
        self.with_state(|s| {
            s.app_role_assignments.push(AppRoleAssignment {
                id: Uuid::new_v4().to_string(),
                principal_id,
                resource_id,
                app_role_id,
            })
        });
        Ok(())
    }

    async fn oauth2_grant(
        &self,
        client_id: Uuid,
        resource_id: Uuid,
    ) -> accessops_azure::Result<Option<OAuth2Grant>> {
        self.call("oauth2_grant", false, client_id.to_string())?;
        Ok(self.with_state(|s| {
            s.grants
                .iter()
                .find(|g| g.client_id == client_id && g.resource_id == resource_id)
                .cloned()
        }))
    }

    async fn create_oauth2_grant(
        &self,
        client_id: Uuid,
        resource_id: Uuid,
        scopes: &[String],
    ) -> accessops_azure::Result<()> {
        self.call("create_oauth2_grant", true, scopes.join(" "))?;
        self.with_state(|s| {
            s.grants.push(OAuth2Grant {
                id: Uuid::new_v4().to_string(),
                client_id,
                consent_type: "AllPrincipals".into(),
                resource_id,
                scope: scopes.join(" "),
            })
        });
        Ok(())
    }

    async fn update_oauth2_grant(
        &self,
        grant_id: &str,
        scopes: &[String],
    ) -> accessops_azure::Result<()> {
        self.call("update_oauth2_grant", true, scopes.join(" "))?;
        self.with_state(|s| {
            for g in s.grants.iter_mut().filter(|g| g.id == grant_id) {
                g.scope = scopes.join(" ");
            }
        });
        Ok(())
    }
}

pub fn definitions(yaml: &str) -> DefinitionSet {
    let file: ConnectionFile = serde_yaml::from_str(yaml).expect("valid yaml");
    let mut set = DefinitionSet::new();
    set.extend_from_file(Path::new("test.yml"), file)
        .expect("unique names");
    set.validate().expect("valid definitions");
    set
}
