//! API permissions: application roles and tenant-wide delegated scopes

use std::collections::HashSet;

use accessops_azure::{ResourceApi, ServicePrincipal};
use accessops_config::{ApiPermission, ServiceConnectionDefinition};
use uuid::Uuid;

use crate::reconciler::Reconciler;
use crate::report::{Action, ChangeKind, ReconcileReport};
use crate::{ReconcileError, Result};

impl Reconciler {
    pub(crate) async fn reconcile_api_permissions(
        &self,
        name: &str,
        def: &ServiceConnectionDefinition,
        principal: &ServicePrincipal,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        if def.api_permissions.is_empty() {
            return Ok(());
        }

        let wants_app_roles = def.api_permissions.iter().any(|p| !p.application.is_empty());
        // (resource, app role) pairs held, including those granted or planned below
        let mut held: HashSet<(Uuid, Uuid)> = HashSet::new();
        if wants_app_roles && !principal.placeholder {
            let assigned = self
                .directory
                .app_role_assignments(principal.id)
                .await
                .map_err(ReconcileError::azure(name))?;
            held.extend(assigned.iter().map(|a| (a.resource_id, a.app_role_id)));
        }

        for permission in &def.api_permissions {
            let Some(api) = self
                .directory
                .find_resource_api(&permission.api)
                .await
                .map_err(ReconcileError::azure(name))?
            else {
                report.warn(name, format!("api '{}' not found", permission.api));
                continue;
            };

            self.ensure_app_roles(name, permission, &api, principal, &mut held, report)
                .await?;
            self.ensure_delegated_grant(name, permission, &api, principal, report)
                .await?;
        }
        Ok(())
    }

    async fn ensure_app_roles(
        &self,
        name: &str,
        permission: &ApiPermission,
        api: &ResourceApi,
        principal: &ServicePrincipal,
        held: &mut HashSet<(Uuid, Uuid)>,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        for value in &permission.application {
            let Some(role) = api.app_role(value) else {
                report.warn(
                    name,
                    format!("app role '{value}' not found on '{}'", api.display_name),
                );
                continue;
            };

            let target = format!("{} {value}", api.display_name);
            // insert() is false when the pair is already held
            if !held.insert((api.id, role.id)) {
                report.record(name, ChangeKind::AppRole, target, Action::Unchanged, None);
            } else if self.options.dry_run {
                report.record(name, ChangeKind::AppRole, target, Action::Planned, None);
            } else {
                self.directory
                    .assign_app_role(principal.id, api.id, role.id)
                    .await
                    .map_err(ReconcileError::azure(name))?;
                report.record(name, ChangeKind::AppRole, target, Action::Created, None);
            }
        }
        Ok(())
    }

    async fn ensure_delegated_grant(
        &self,
        name: &str,
        permission: &ApiPermission,
        api: &ResourceApi,
        principal: &ServicePrincipal,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        let mut wanted: Vec<String> = Vec::new();
        for value in &permission.delegated {
            if api.scope(value).is_some() {
                wanted.push(value.clone());
            } else {
                report.warn(
                    name,
                    format!("delegated scope '{value}' not found on '{}'", api.display_name),
                );
            }
        }
        if wanted.is_empty() {
            return Ok(());
        }

        let target = format!("{} {}", api.display_name, wanted.join(" "));
        let kind = ChangeKind::DelegatedGrant;
        let grant = if principal.placeholder {
            None
        } else {
            self.directory
                .oauth2_grant(principal.id, api.id)
                .await
                .map_err(ReconcileError::azure(name))?
        };

        match grant {
            None if self.options.dry_run => {
                report.record(name, kind, target, Action::Planned, None);
            }
            None => {
                self.directory
                    .create_oauth2_grant(principal.id, api.id, &wanted)
                    .await
                    .map_err(ReconcileError::azure(name))?;
                report.record(name, kind, target, Action::Created, None);
            }
            Some(grant) => {
                let missing: Vec<String> = wanted
                    .iter()
                    .filter(|s| !grant.has_scope(s))
                    .cloned()
                    .collect();
                if missing.is_empty() {
                    report.record(name, kind, target, Action::Unchanged, None);
                    return Ok(());
                }

                // Grants not listed in the definition are left in place
                let mut scopes: Vec<String> =
                    grant.scopes().into_iter().map(String::from).collect();
                scopes.extend(missing.iter().cloned());
                let detail = Some(format!("add {}", missing.join(" ")));

                if self.options.dry_run {
                    report.record(name, kind, target, Action::Planned, detail);
                } else {
                    self.directory
                        .update_oauth2_grant(&grant.id, &scopes)
                        .await
                        .map_err(ReconcileError::azure(name))?;
                    report.record(name, kind, target, Action::Updated, detail);
                }
            }
        }
        Ok(())
    }
}
