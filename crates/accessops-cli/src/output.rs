use accessops_config::{ConnectionScope, DefinitionSet};
use accessops_reconcile::{Action, ReconcileReport};
use anyhow::Result;
use colored::Colorize;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::OutputFormat;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_report(report: &ReconcileReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Table => {
            if report.changes.is_empty() {
                println!("Nothing to reconcile.");
            } else {
                println!("{}", report_table(report));
            }
            for warning in &report.warnings {
                print_warning(&format!("{}: {}", warning.connection, warning.message));
            }
            let summary = report_summary(report);
            if report.dry_run {
                println!("{} {summary}", "Plan:".cyan());
            } else {
                print_success(&summary);
            }
        }
    }
    Ok(())
}

pub fn report_table(report: &ReconcileReport) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Connection", "Kind", "Target", "Action", "Detail"]);
    for change in &report.changes {
        builder.push_record([
            change.connection.clone(),
            change.kind.to_string(),
            change.target.clone(),
            change.action.to_string(),
            change.detail.clone().unwrap_or_else(|| "-".into()),
        ]);
    }
    builder.build().with(Style::rounded()).to_string()
}

pub fn report_summary(report: &ReconcileReport) -> String {
    let mut summary = if report.dry_run {
        format!("{} to change", report.count(Action::Planned))
    } else {
        format!(
            "{} created, {} updated",
            report.count(Action::Created),
            report.count(Action::Updated)
        )
    };
    summary.push_str(&format!(
        ", {} unchanged, {} warning(s)",
        report.count(Action::Unchanged),
        report.warnings.len()
    ));
    summary
}

pub fn definitions_table(definitions: &DefinitionSet) -> String {
    let mut builder = Builder::default();
    builder.push_record([
        "Connection",
        "Project",
        "Subscription",
        "Management groups",
        "Subscriptions",
        "APIs",
        "Source",
    ]);
    for (name, entry) in definitions.entries() {
        let def = &entry.definition;
        let subscription = match def.scope() {
            ConnectionScope::ResourceGroup(rg) => format!("{} ({rg})", def.subscription_name),
            ConnectionScope::Subscription => def.subscription_name.clone(),
        };
        let source = entry
            .source
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        builder.push_record([
            name.to_string(),
            def.project.clone(),
            subscription,
            def.management_groups.len().to_string(),
            def.subscriptions.len().to_string(),
            def.api_permissions.len().to_string(),
            source,
        ]);
    }
    builder.build().with(Style::rounded()).to_string()
}
