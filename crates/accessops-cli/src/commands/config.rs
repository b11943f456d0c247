use accessops_config::Settings;
use accessops_config::settings::mask;
use anyhow::Result;
use colored::Colorize;

use crate::cli::OutputFormat;

/// Settings as they will be used, secrets replaced by a marker
pub fn masked(settings: &Settings) -> Settings {
    let mut shown = settings.clone();
    shown.azure.client_secret = mask(&settings.azure.client_secret).to_string();
    shown.devops.personal_access_token = settings
        .devops
        .personal_access_token
        .as_deref()
        .map(|pat| mask(pat).to_string());
    shown
}

pub fn show(settings: &Settings, format: OutputFormat) -> Result<()> {
    let shown = masked(settings);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&shown)?),
        OutputFormat::Table => {
            let azure = &shown.azure;
            let devops = &shown.devops;
            let rows = [
                ("azure.tenant_id", azure.tenant_id.as_str()),
                ("azure.client_id", azure.client_id.as_str()),
                ("azure.client_secret", azure.client_secret.as_str()),
                ("azure.authority_host", azure.authority_host.as_str()),
                ("azure.management_endpoint", azure.management_endpoint.as_str()),
                ("azure.graph_endpoint", azure.graph_endpoint.as_str()),
                ("devops.organization", devops.organization.as_str()),
                ("devops.base_url", devops.base_url.as_str()),
                (
                    "devops.personal_access_token",
                    devops.personal_access_token.as_deref().unwrap_or("(not set)"),
                ),
                ("logging.level", shown.logging.level.as_str()),
            ];
            for (key, value) in rows {
                println!("{}: {}", key.cyan(), value);
            }
            println!(
                "{}: {}",
                "azure.request_timeout_secs".cyan(),
                azure.request_timeout_secs
            );
        }
    }
    Ok(())
}
