use std::path::Path;

use accessops_config::{DefinitionSet, load_definitions, load_definitions_file};
use anyhow::{Context, Result};
use serde_json::json;

use crate::cli::OutputFormat;
use crate::output::{definitions_table, print_success, print_warning};

/// Load and validate definitions without touching Azure
pub fn validate(path: &Path, format: OutputFormat) -> Result<()> {
    let definitions =
        load(path).with_context(|| format!("Invalid definitions in {}", path.display()))?;

    match format {
        OutputFormat::Json => {
            let summary: Vec<_> = definitions
                .entries()
                .map(|(name, entry)| {
                    let def = &entry.definition;
                    json!({
                        "name": name,
                        "source": entry.source,
                        "project": def.project,
                        "subscription_id": def.subscription_id,
                        "subscription_name": def.subscription_name,
                        "resource_group": def.resource_group,
                        "management_groups": def.management_groups.len(),
                        "subscriptions": def.subscriptions.len(),
                        "api_permissions": def.api_permissions.len(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Table => {
            if definitions.is_empty() {
                print_warning(&format!("No definitions found in {}", path.display()));
                return Ok(());
            }
            println!("{}", definitions_table(&definitions));
            print_success(&format!("{} definition(s) valid", definitions.len()));
        }
    }
    Ok(())
}

/// A directory is loaded whole; a single file is checked on its own
fn load(path: &Path) -> accessops_config::Result<DefinitionSet> {
    if !path.is_file() {
        return load_definitions(path);
    }
    let mut set = DefinitionSet::new();
    set.extend_from_file(path, load_definitions_file(path)?)?;
    set.validate()?;
    Ok(set)
}
