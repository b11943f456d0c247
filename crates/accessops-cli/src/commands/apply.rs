use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use accessops_azure::{
    ArmClient, Credential, DEVOPS_RESOURCE_ID, DevOpsClient, GraphClient, TokenProvider,
};
use accessops_config::{Settings, load_definitions};
use accessops_reconcile::{ReconcileOptions, Reconciler};
use anyhow::{Context, Result};
use tracing::info;

use crate::cli::OutputFormat;
use crate::output::{print_report, print_warning};

pub async fn apply(
    settings: &Settings,
    dir: &Path,
    dry_run: bool,
    format: OutputFormat,
) -> Result<()> {
    settings.validate().context("Invalid settings")?;
    let definitions = load_definitions(dir)
        .with_context(|| format!("Failed to load definitions from {}", dir.display()))?;
    if definitions.is_empty() {
        print_warning(&format!("No definitions found in {}", dir.display()));
        return Ok(());
    }

    info!(count = definitions.len(), dry_run, "Reconciling service connections");
    let reconciler = build_reconciler(settings, dry_run)?;
    let report = reconciler.run(&definitions).await?;
    print_report(&report, format)
}

fn build_reconciler(settings: &Settings, dry_run: bool) -> Result<Reconciler> {
    let azure = &settings.azure;
    let timeout = Duration::from_secs(azure.request_timeout_secs);
    let http = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")?;
    let tokens = Arc::new(TokenProvider::new(
        http.clone(),
        &azure.authority_host,
        &azure.tenant_id,
        &azure.client_id,
        &azure.client_secret,
    ));

    let arm = ArmClient::new(
        http.clone(),
        &azure.management_endpoint,
        Credential::client_secret(tokens.clone(), &azure.management_endpoint),
    );
    let graph = GraphClient::new(
        http.clone(),
        &azure.graph_endpoint,
        Credential::client_secret(tokens.clone(), &azure.graph_endpoint),
    );
    let devops_credential = match &settings.devops.personal_access_token {
        Some(pat) if !pat.is_empty() => Credential::Pat(pat.clone()),
        _ => Credential::client_secret(tokens, DEVOPS_RESOURCE_ID),
    };
    let devops = DevOpsClient::new(
        http,
        &settings.devops.base_url,
        &settings.devops.organization,
        devops_credential,
    );

    let options = ReconcileOptions::new(azure.tenant_id.clone()).with_dry_run(dry_run);
    Ok(Reconciler::new(
        Arc::new(arm),
        Arc::new(graph),
        Arc::new(devops),
        options,
    ))
}
