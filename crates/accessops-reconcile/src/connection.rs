//! Service connection create-or-update and principal resolution

use accessops_azure::{EndpointRequest, ServiceEndpoint, ServicePrincipal};
use accessops_config::{ConnectionScope, ServiceConnectionDefinition};
use tracing::debug;

use crate::reconciler::Reconciler;
use crate::report::{Action, ChangeKind, ReconcileReport};
use crate::{ReconcileError, Result};

impl Reconciler {
    /// Returns the principal later steps grant to, or `None` when the
    /// definition cannot be reconciled (its project does not exist).
    pub(crate) async fn ensure_service_connection(
        &self,
        name: &str,
        def: &ServiceConnectionDefinition,
        report: &mut ReconcileReport,
    ) -> Result<Option<ServicePrincipal>> {
        let Some(project) = self
            .endpoints
            .project(&def.project)
            .await
            .map_err(ReconcileError::azure(name))?
        else {
            report.warn(
                name,
                format!("project '{}' not found; connection skipped", def.project),
            );
            return Ok(None);
        };

        let request = EndpointRequest {
            name: name.to_string(),
            description: def.description.clone(),
            project,
            tenant_id: self.options.tenant_id.clone(),
            subscription_id: def.subscription_id,
            subscription_name: def.subscription_name.clone(),
            resource_group: match def.scope() {
                ConnectionScope::ResourceGroup(rg) => Some(rg.to_string()),
                ConnectionScope::Subscription => None,
            },
        };

        let existing = self
            .endpoints
            .find_endpoint(&def.project, name)
            .await
            .map_err(ReconcileError::azure(name))?;

        let target = format!("{}/{}", def.project, name);
        let kind = ChangeKind::ServiceConnection;
        let mut created = false;
        let endpoint = match existing {
            None if self.options.dry_run => {
                report.record(name, kind, target, Action::Planned, Some("create".into()));
                None
            }
            None => {
                let endpoint = self
                    .endpoints
                    .create_endpoint(&request)
                    .await
                    .map_err(ReconcileError::azure(name))?;
                report.record(name, kind, target, Action::Created, None);
                created = true;
                Some(endpoint)
            }
            Some(existing) => {
                let diff = request.differences(&existing);
                if diff.is_empty() {
                    report.record(name, kind, target, Action::Unchanged, None);
                    Some(existing)
                } else if self.options.dry_run {
                    let detail = Some(format!("update {}", diff.join(", ")));
                    report.record(name, kind, target, Action::Planned, detail);
                    Some(existing)
                } else {
                    let updated = self
                        .endpoints
                        .update_endpoint(&existing, &request)
                        .await
                        .map_err(ReconcileError::azure(name))?;
                    report.record(name, kind, target, Action::Updated, Some(diff.join(", ")));
                    Some(updated)
                }
            }
        };

        self.resolve_principal(name, &def.project, endpoint, created)
            .await
            .map(Some)
    }

    /// Only a connection created by this run is waited for; DevOps provisions
    /// its principal asynchronously.
    async fn resolve_principal(
        &self,
        name: &str,
        project: &str,
        endpoint: Option<ServiceEndpoint>,
        created: bool,
    ) -> Result<ServicePrincipal> {
        let Some(mut endpoint) = endpoint else {
            debug!(connection = name, "Using placeholder principal");
            return Ok(ServicePrincipal::placeholder(name));
        };

        let mut attempt = 0;
        loop {
            if let Some(app_id) = endpoint.service_principal_app_id() {
                let found = self
                    .directory
                    .service_principal_by_app_id(app_id)
                    .await
                    .map_err(ReconcileError::azure(name))?;
                match found {
                    Some(sp) => return Ok(sp),
                    None if self.options.dry_run => {
                        return Ok(ServicePrincipal::placeholder(name));
                    }
                    None if !created || attempt >= self.options.provision_attempts => {
                        return Err(ReconcileError::PrincipalNotFound {
                            connection: name.to_string(),
                            app_id,
                        });
                    }
                    None => {}
                }
            } else if self.options.dry_run {
                return Ok(ServicePrincipal::placeholder(name));
            } else if !created || attempt >= self.options.provision_attempts {
                return Err(ReconcileError::PrincipalPending {
                    connection: name.to_string(),
                });
            }

            // Both DevOps and the directory lag behind a fresh connection
            attempt += 1;
            debug!(connection = name, attempt, "Waiting for service principal");
            tokio::time::sleep(self.options.provision_poll).await;
            if let Some(refreshed) = self
                .endpoints
                .find_endpoint(project, name)
                .await
                .map_err(ReconcileError::azure(name))?
            {
                endpoint = refreshed;
            }
        }
    }
}
