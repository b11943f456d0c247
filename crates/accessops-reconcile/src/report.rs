use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    ServiceConnection,
    RoleAssignment,
    AppRole,
    DelegatedGrant,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ServiceConnection => "service connection",
            Self::RoleAssignment => "role assignment",
            Self::AppRole => "app role",
            Self::DelegatedGrant => "delegated grant",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Created,
    Updated,
    /// Would be created or updated; dry run
    Planned,
    Unchanged,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Planned => "planned",
            Self::Unchanged => "unchanged",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub connection: String,
    pub kind: ChangeKind,
    pub target: String,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub connection: String,
    pub message: String,
}

/// Outcome of a run, in the order things were visited
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub dry_run: bool,
    pub changes: Vec<Change>,
    pub warnings: Vec<Warning>,
}

impl ReconcileReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    pub(crate) fn record(
        &mut self,
        connection: &str,
        kind: ChangeKind,
        target: impl Into<String>,
        action: Action,
        detail: Option<String>,
    ) {
        let target = target.into();
        info!(connection, %kind, target = %target, %action, "Reconciled");
        self.changes.push(Change {
            connection: connection.to_string(),
            kind,
            target,
            action,
            detail,
        });
    }

    pub(crate) fn warn(&mut self, connection: &str, message: impl Into<String>) {
        let message = message.into();
        warn!(connection, "{message}");
        self.warnings.push(Warning {
            connection: connection.to_string(),
            message,
        });
    }

    pub fn count(&self, action: Action) -> usize {
        self.changes.iter().filter(|c| c.action == action).count()
    }

    /// True when the run wrote (or, in a dry run, would write) anything
    pub fn has_changes(&self) -> bool {
        self.changes.iter().any(|c| c.action != Action::Unchanged)
    }

    pub fn changes_for<'a>(&'a self, connection: &'a str) -> impl Iterator<Item = &'a Change> {
        self.changes.iter().filter(move |c| c.connection == connection)
    }
}
