//! Reconciliation of service connection definitions against Azure.
//!
//! For every definition, in order:
//!
//! 1. ensure the Azure DevOps service connection exists and matches
//!    (create-or-update) and resolve its backing service principal
//! 2. grant management group roles
//! 3. grant subscription and resource group roles
//! 4. grant API permissions (application roles and delegated scopes)
//!
//! Every grant is checked for existence first, so runs are repeatable. A
//! target that does not exist is recorded as a warning and skipped; any
//! API failure aborts the whole run.
//!
//! In dry-run mode nothing is written. When the service connection does not
//! exist yet, a placeholder principal stands in so the fan-out still reports
//! what it would grant.

mod connection;
mod permissions;
mod reconciler;
mod report;
mod roles;

pub use reconciler::{ReconcileOptions, Reconciler};
pub use report::{Action, Change, ChangeKind, ReconcileReport, Warning};

use accessops_azure::AzureError;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("{connection}: {source}")]
    Azure {
        connection: String,
        #[source]
        source: AzureError,
    },

    #[error("{connection}: service principal with app id {app_id} not found in the directory")]
    PrincipalNotFound { connection: String, app_id: Uuid },

    #[error("{connection}: service connection was not provisioned with a service principal")]
    PrincipalPending { connection: String },
}

impl ReconcileError {
    pub(crate) fn azure(connection: &str) -> impl FnOnce(AzureError) -> Self {
        let connection = connection.to_string();
        move |source| Self::Azure { connection, source }
    }

    pub fn connection(&self) -> &str {
        match self {
            Self::Azure { connection, .. }
            | Self::PrincipalNotFound { connection, .. }
            | Self::PrincipalPending { connection } => connection,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
