use accessops_projfile::ProjectFile;
use anyhow::{Context, Result, bail};

use crate::cli::RemovePackageArgs;
use crate::output::{print_success, print_warning};

pub fn remove(args: &RemovePackageArgs) -> Result<()> {
    let mut project = ProjectFile::load(&args.project)
        .with_context(|| format!("Failed to read {}", args.project.display()))?;

    let removed = project.remove_package_reference(&args.package);
    if removed == 0 {
        let msg = format!(
            "{} does not reference package {}",
            args.project.display(),
            args.package
        );
        if args.strict {
            bail!(msg);
        }
        print_warning(&msg);
        return Ok(());
    }

    let target = args.output.as_ref().unwrap_or(&args.project);
    project
        .save(target)
        .with_context(|| format!("Failed to write {}", target.display()))?;
    print_success(&format!(
        "Removed {removed} reference(s) to {} from {}",
        args.package,
        target.display()
    ));
    Ok(())
}
