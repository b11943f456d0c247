use std::sync::Arc;
use std::time::Duration;

use accessops_azure::{Directory, ResourceManager, ServiceEndpoints};
use accessops_config::{DefinitionSet, ServiceConnectionDefinition};
use tracing::{Instrument, info, info_span};

use crate::Result;
use crate::report::ReconcileReport;

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Report intended changes without writing anything
    pub dry_run: bool,
    /// Tenant the service connections authenticate against
    pub tenant_id: String,
    /// How often to re-check a freshly created connection for its principal
    pub provision_poll: Duration,
    pub provision_attempts: u32,
}

impl ReconcileOptions {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            dry_run: false,
            tenant_id: tenant_id.into(),
            provision_poll: Duration::from_secs(5),
            provision_attempts: 12,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_provision_poll(mut self, poll: Duration, attempts: u32) -> Self {
        self.provision_poll = poll;
        self.provision_attempts = attempts;
        self
    }
}

pub struct Reconciler {
    pub(crate) arm: Arc<dyn ResourceManager>,
    pub(crate) directory: Arc<dyn Directory>,
    pub(crate) endpoints: Arc<dyn ServiceEndpoints>,
    pub(crate) options: ReconcileOptions,
}

impl Reconciler {
    pub fn new(
        arm: Arc<dyn ResourceManager>,
        directory: Arc<dyn Directory>,
        endpoints: Arc<dyn ServiceEndpoints>,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            arm,
            directory,
            endpoints,
            options,
        }
    }

    /// Reconcile every definition in order; the first API failure stops the run
    pub async fn run(&self, definitions: &DefinitionSet) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new(self.options.dry_run);
        info!(
            connections = definitions.len(),
            dry_run = self.options.dry_run,
            "Starting reconciliation"
        );

        for (name, definition) in definitions.iter() {
            let span = info_span!("connection", connection = %name);
            self.reconcile_connection(name, definition, &mut report)
                .instrument(span)
                .await?;
        }

        info!(
            created = report.count(crate::Action::Created),
            updated = report.count(crate::Action::Updated),
            planned = report.count(crate::Action::Planned),
            warnings = report.warnings.len(),
            "Reconciliation finished"
        );
        Ok(report)
    }

    async fn reconcile_connection(
        &self,
        name: &str,
        definition: &ServiceConnectionDefinition,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        // Everything after this point grants to the connection's principal
        let Some(principal) = self
            .ensure_service_connection(name, definition, report)
            .await?
        else {
            return Ok(());
        };

        self.reconcile_management_groups(name, definition, &principal, report)
            .await?;
        self.reconcile_subscriptions(name, definition, &principal, report)
            .await?;
        self.reconcile_api_permissions(name, definition, &principal, report)
            .await?;
        Ok(())
    }
}
