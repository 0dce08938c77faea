/// `dopack clean` command implementation
///
/// Builds stamp each run into fresh `<target>_<version>` folders, so older
/// stamps accumulate until cleaned. Only stamped target folders are removed;
/// the entry file and anything else under the output root stay untouched.
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::cli::CleanArgs;
use crate::compiler::Target;
use crate::config::load_config_with_discovery;

fn is_stamped_folder(name: &str) -> bool {
    [Target::Es5, Target::Es6]
        .iter()
        .any(|target| {
            name.strip_prefix(target.as_str())
                .and_then(|rest| rest.strip_prefix('_'))
                .is_some_and(|stamp| !stamp.is_empty())
        })
}

pub fn run(args: &CleanArgs) -> Result<()> {
    let config = load_config_with_discovery(args.config.as_deref())?.unwrap_or_default();
    let output = args
        .output
        .clone()
        .or(config.build.output)
        .unwrap_or_else(|| "dist".to_string());
    let output = Path::new(&output);

    if !output.exists() {
        info!(
            operation = "clean",
            status = "success",
            output = %output.display(),
            "nothing to clean"
        );
        return Ok(());
    }

    let mut removed = 0;
    for entry in fs::read_dir(output)
        .with_context(|| format!("Failed to read output directory: {}", output.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_stamped_folder(&name) {
            continue;
        }
        fs::remove_dir_all(entry.path())
            .with_context(|| format!("Failed to remove: {}", entry.path().display()))?;
        removed += 1;
        info!(operation = "clean", folder = %name, "stamped folder removed");
    }

    info!(
        operation = "clean",
        status = "success",
        entry_count = removed,
        output = %output.display(),
        "clean finished"
    );
    Ok(())
}
