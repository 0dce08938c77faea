/// `dopack components` command implementation
use anyhow::{Context, Result};
use std::path::Path;

use crate::cli::ComponentsArgs;
use crate::components::discover_components;
use crate::config::load_config_with_discovery;

pub fn run(args: &ComponentsArgs) -> Result<()> {
    let config = load_config_with_discovery(args.config.as_deref())?.unwrap_or_default();
    let root = args
        .root
        .clone()
        .or(config.build.root)
        .unwrap_or_else(|| ".".to_string());

    let components = discover_components(Path::new(&root))
        .with_context(|| format!("Failed to discover components under {root}"))?;

    if components.is_empty() {
        println!("No component manifests found under {root}");
        return Ok(());
    }

    for component in components {
        println!(
            "{}\t{}\t(declared by {})",
            component.name,
            component.path.display(),
            component.manifest.display()
        );
    }
    Ok(())
}
