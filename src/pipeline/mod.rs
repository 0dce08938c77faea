/// The packaging pipeline
///
/// Wires the four stages into one chain: choose-first dedup, sidecar
/// variable collection, target fan-out, compile-with-cache. The chain is
/// built once per invocation; all per-invocation state (seen-set, variable
/// store, version token) lives inside the stage constructors.
pub mod compile;
pub mod constants;
pub mod dedup;
pub mod step;
pub mod targets;
pub mod variables;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::info;

use crate::asset::ScriptFile;
use crate::cache::{CompileCache, PassthroughCache};
use crate::compiler::{Compiler, Mode, PassthroughCompiler, Target};
use crate::error::PipelineError;

pub use compile::compile_with_cache;
pub use constants::{emplace_constants, NAMESPACE};
pub use dedup::choose_first;
pub use step::Step;
pub use targets::{fan_out_targets, ENTRY_FILE};
pub use variables::{collect_variables, VariableStore, GLOBALS_SENTINEL};

/// Environment fallback for the compilation mode.
pub const MODE_ENV_VAR: &str = "DOPACK_CONFIGURATION";

pub type VersionFuture = Pin<Box<dyn Future<Output = Result<String, PipelineError>> + Send>>;
/// Factory producing the run's version token; invoked exactly once per
/// pipeline construction.
pub type VersionFactory = Box<dyn FnOnce() -> VersionFuture + Send>;

pub struct PipelineOptions {
    /// Base URI components are loaded from at runtime; injected into the
    /// entry file.
    pub prefix: Option<String>,
    /// Compilation mode; falls back to `DOPACK_CONFIGURATION`, then Debug.
    pub mode: Option<Mode>,
    /// Requested targets; empty means es5 only.
    pub targets: Vec<Target>,
    /// Version token factory; defaults to the current Unix timestamp in
    /// milliseconds.
    pub version: Option<VersionFactory>,
    /// Shared compile cache; `None` opts out of memoization.
    pub cache: Option<Arc<dyn CompileCache>>,
    pub compiler: Arc<dyn Compiler>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            prefix: None,
            mode: None,
            targets: Vec::new(),
            version: None,
            cache: None,
            compiler: Arc::new(PassthroughCompiler),
        }
    }
}

fn resolve_mode(requested: Option<Mode>) -> Result<Mode, PipelineError> {
    if let Some(mode) = requested {
        return Ok(mode);
    }
    match std::env::var(MODE_ENV_VAR) {
        Ok(value) => value.parse(),
        Err(_) => Ok(Mode::default()),
    }
}

fn default_version() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}

/// Build the full transformation for one invocation.
pub async fn build_pipeline(options: PipelineOptions) -> Result<Step<ScriptFile>, PipelineError> {
    let mode = resolve_mode(options.mode)?;
    let targets = if options.targets.is_empty() {
        vec![Target::Es5]
    } else {
        options.targets
    };
    let version = match options.version {
        Some(factory) => factory().await?,
        None => default_version(),
    };
    let cache = options
        .cache
        .unwrap_or_else(|| Arc::new(PassthroughCache));
    let store = Arc::new(VariableStore::default());

    info!(
        operation = "pipeline.build",
        mode = %mode,
        version = %version,
        targets = targets.len(),
        "pipeline assembled"
    );

    Ok(choose_first()
        .chain(&collect_variables(Arc::clone(&store)))
        .chain(&fan_out_targets(
            version,
            options.prefix.unwrap_or_default(),
            targets,
        ))
        .chain(&compile_with_cache(mode, store, cache, options.compiler)))
}

/// Drive a priority-ordered file sequence through the chain, preserving
/// order across inputs.
pub async fn run_files(
    pipeline: &Step<ScriptFile>,
    files: Vec<ScriptFile>,
) -> Result<Vec<ScriptFile>, PipelineError> {
    let mut outputs = Vec::new();
    for file in files {
        outputs.extend(pipeline.run(file).await?);
    }
    Ok(outputs)
}
