//! Role assignments at management group, subscription and resource group scope

use accessops_azure::ServicePrincipal;
use accessops_config::ServiceConnectionDefinition;

use crate::reconciler::Reconciler;
use crate::report::{Action, ChangeKind, ReconcileReport};
use crate::{ReconcileError, Result};

impl Reconciler {
    pub(crate) async fn reconcile_management_groups(
        &self,
        name: &str,
        def: &ServiceConnectionDefinition,
        principal: &ServicePrincipal,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        for grant in &def.management_groups {
            let Some(mg) = self
                .arm
                .management_group(&grant.name)
                .await
                .map_err(ReconcileError::azure(name))?
            else {
                report.warn(name, format!("management group '{}' not found", grant.name));
                continue;
            };
            self.ensure_role_assignment(name, &mg.id, &grant.role, principal, report)
                .await?;
        }
        Ok(())
    }

    pub(crate) async fn reconcile_subscriptions(
        &self,
        name: &str,
        def: &ServiceConnectionDefinition,
        principal: &ServicePrincipal,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        for grant in &def.subscriptions {
            let Some(subscription) = self
                .arm
                .subscription(grant.id)
                .await
                .map_err(ReconcileError::azure(name))?
            else {
                report.warn(name, format!("subscription {} not found", grant.id));
                continue;
            };

            if let Some(role) = &grant.role {
                self.ensure_role_assignment(name, &subscription.id, role, principal, report)
                    .await?;
            }

            for rg_grant in &grant.resource_groups {
                let Some(rg) = self
                    .arm
                    .resource_group(grant.id, &rg_grant.name)
                    .await
                    .map_err(ReconcileError::azure(name))?
                else {
                    report.warn(
                        name,
                        format!(
                            "resource group '{}' not found in subscription {}",
                            rg_grant.name, grant.id
                        ),
                    );
                    continue;
                };
                self.ensure_role_assignment(name, &rg.id, &rg_grant.role, principal, report)
                    .await?;
            }
        }
        Ok(())
    }

    async fn ensure_role_assignment(
        &self,
        name: &str,
        scope: &str,
        role: &str,
        principal: &ServicePrincipal,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        let Some(definition) = self
            .arm
            .role_definition(scope, role)
            .await
            .map_err(ReconcileError::azure(name))?
        else {
            report.warn(name, format!("role '{role}' not found at {scope}"));
            return Ok(());
        };

        let target = format!("{role} @ {scope}");

        // A placeholder principal cannot hold anything yet
        if !principal.placeholder {
            let existing = self
                .arm
                .role_assignments(scope, principal.id)
                .await
                .map_err(ReconcileError::azure(name))?;
            if existing.iter().any(|ra| ra.grants(&definition.id)) {
                report.record(name, ChangeKind::RoleAssignment, target, Action::Unchanged, None);
                return Ok(());
            }
        }

        if self.options.dry_run {
            report.record(name, ChangeKind::RoleAssignment, target, Action::Planned, None);
            return Ok(());
        }

        self.arm
            .create_role_assignment(scope, &definition.id, principal.id)
            .await
            .map_err(ReconcileError::azure(name))?;
        report.record(name, ChangeKind::RoleAssignment, target, Action::Created, None);
        Ok(())
    }
}
