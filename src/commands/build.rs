/// `dopack build` command implementation
///
/// Collects the requested components in priority order, drives them through
/// the packaging pipeline, and writes the resulting layout under the output
/// directory.
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::cache::{CompileCache, MtimeCache};
use crate::cli::BuildArgs;
use crate::compiler::{Mode, PassthroughCompiler};
use crate::components::collect_component_files;
use crate::config::load_config_with_discovery;
use crate::pipeline::{build_pipeline, run_files, PipelineOptions};

pub async fn run(args: &BuildArgs) -> Result<()> {
    let config = load_config_with_discovery(args.config.as_deref())?.unwrap_or_default();
    let defaults = config.build;

    let root = args
        .root
        .clone()
        .or(defaults.root)
        .unwrap_or_else(|| ".".to_string());
    let components = if args.components.is_empty() {
        defaults.components
    } else {
        args.components.clone()
    };
    if components.is_empty() {
        anyhow::bail!(
            "no components requested; pass --components or set [build].components in dopack.toml"
        );
    }
    let output = PathBuf::from(
        args.output
            .clone()
            .or(defaults.output)
            .unwrap_or_else(|| "dist".to_string()),
    );
    let prefix = args.prefix.clone().or(defaults.prefix);
    let mode = args.mode.or(defaults.mode).unwrap_or_default();
    let targets = if args.targets.is_empty() {
        defaults.targets
    } else {
        args.targets.clone()
    };

    let mut files = collect_component_files(Path::new(&root), &components)
        .with_context(|| format!("Failed to collect components under {root}"))?;
    info!(
        operation = "build.collect",
        file_count = files.len(),
        component_count = components.len(),
        "sources collected"
    );

    // Initialize map tracking whenever the mode emits maps; the compile
    // stage only attaches maps to files that carry tracking state.
    if mode != Mode::Production {
        for file in &mut files {
            if file.relative.extension().is_some_and(|ext| ext == "js") {
                file.source_map = Some(String::new());
            }
        }
    }

    let cache: Option<Arc<dyn CompileCache>> = if args.no_cache {
        None
    } else {
        Some(Arc::new(MtimeCache::new()))
    };

    let pipeline = build_pipeline(PipelineOptions {
        prefix,
        mode: Some(mode),
        targets,
        version: None,
        cache,
        compiler: Arc::new(PassthroughCompiler),
    })
    .await?;

    let outputs = run_files(&pipeline, files).await?;

    for file in &outputs {
        let destination = output.join(&file.destination);
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }
        tokio::fs::write(&destination, &file.contents)
            .await
            .with_context(|| format!("Failed to write output: {}", destination.display()))?;

        if let Some(map) = file.source_map.as_ref().filter(|map| !map.is_empty()) {
            let map_path = destination.with_extension("js.map");
            tokio::fs::write(&map_path, map)
                .await
                .with_context(|| format!("Failed to write source map: {}", map_path.display()))?;
        }
    }

    info!(
        operation = "build.write",
        status = "success",
        file_count = outputs.len(),
        output = %output.display(),
        "build finished"
    );
    Ok(())
}
