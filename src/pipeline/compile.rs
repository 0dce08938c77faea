/// Compile-with-cache stage
///
/// Resolves the compile config from (target, mode), merges declared and
/// injected variables, and delegates to the cache keyed by the file's stable
/// source identity. The compute path splices compile-time constants into the
/// source and invokes the external compiler.
use std::sync::Arc;
use tracing::debug;

use crate::asset::{ScriptFile, Variables};
use crate::cache::{CompileCache, ComputeFn};
use crate::compiler::{Compiler, Mode, Profile};
use crate::error::PipelineError;
use crate::pipeline::constants::emplace_constants;
use crate::pipeline::step::Step;
use crate::pipeline::variables::VariableStore;

/// Merge the variable layers bound to a file. Directory globals first, then
/// the file-specific sidecar, then fan-out-injected values; later layers win
/// on key collision.
fn merge_variables(store: &VariableStore, file: &ScriptFile) -> Variables {
    let mut merged = Variables::new();
    if let Some(globals) = store.lookup(&file.directory_key()) {
        merged.extend(globals);
    }
    if let Some(declared) = store.lookup(&file.variable_key()) {
        merged.extend(declared);
    }
    merged.extend(file.variables.clone());
    merged
}

pub fn compile_with_cache(
    mode: Mode,
    store: Arc<VariableStore>,
    cache: Arc<dyn CompileCache>,
    compiler: Arc<dyn Compiler>,
) -> Step<ScriptFile> {
    Step::new(move |mut file: ScriptFile| {
        let store = Arc::clone(&store);
        let cache = Arc::clone(&cache);
        let compiler = Arc::clone(&compiler);
        async move {
            let target = file
                .target
                .ok_or_else(|| PipelineError::MissingTarget(file.relative.clone()))?;
            let profile = Profile::new(target, mode);
            let config = profile.config();
            let merged = merge_variables(&store, &file);

            let source = file.text()?.to_string();
            let identity = file.relative.clone();
            let filename = file.source_path.clone();

            let compute: ComputeFn = {
                let merged = merged.clone();
                Box::new(move || {
                    Box::pin(async move {
                        let substituted = emplace_constants(&source, &merged, &identity)?;
                        let output = compiler.compile(&substituted, &config, &filename).await?;
                        if output.code.is_empty() && !substituted.is_empty() {
                            return Err(PipelineError::EmptyOutput(identity));
                        }
                        Ok(output)
                    })
                })
            };

            let output = cache
                .get_or_add(&file.source_path, profile, Some(&merged), compute)
                .await?;

            debug!(
                operation = "compile",
                status = "success",
                identity = %file.relative.display(),
                profile = %profile,
                "file compiled"
            );

            if file.source_map.is_some() {
                if let Some(map) = output.source_map {
                    file.source_map = Some(map);
                }
            }
            file.contents = output.code.into_bytes();
            Ok(vec![file])
        }
    })
}
