/// Sidecar variable collection stage
///
/// Sidecars are JSON files declaring compile-time variables for a sibling
/// script (`widget.json` beside `widget.js`) or, via the `globals` sentinel
/// name, for their containing directory as a whole. They are harvested into
/// an invocation-scoped store and never forwarded downstream.
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::asset::{directory_key, path_key, ScriptFile, Variables};
use crate::error::PipelineError;
use crate::pipeline::step::Step;

/// Sidecar base name that applies to the containing directory instead of a
/// single sibling script.
pub const GLOBALS_SENTINEL: &str = "globals";

const SIDECAR_EXTENSION: &str = "json";

/// Shared variable registry for one pipeline invocation. The first sidecar
/// registered for an effective key wins; later ones are ignored.
#[derive(Debug, Default)]
pub struct VariableStore {
    inner: Mutex<HashMap<String, Variables>>,
}

impl VariableStore {
    pub fn register_first(&self, key: String, variables: Variables) -> bool {
        let mut inner = self.inner.lock().expect("variable store poisoned");
        if inner.contains_key(&key) {
            return false;
        }
        inner.insert(key, variables);
        true
    }

    pub fn lookup(&self, key: &str) -> Option<Variables> {
        self.inner
            .lock()
            .expect("variable store poisoned")
            .get(key)
            .cloned()
    }
}

/// Effective registration key for a sidecar: the identity minus the `.json`
/// suffix, except that a `globals` sidecar registers under the base name of
/// its directory.
fn effective_key(relative: &Path) -> String {
    let stripped = relative.with_extension("");
    if stripped.file_name().is_some_and(|name| name == GLOBALS_SENTINEL) {
        directory_key(relative)
    } else {
        path_key(&stripped)
    }
}

pub fn collect_variables(store: Arc<VariableStore>) -> Step<ScriptFile> {
    Step::new(move |file: ScriptFile| {
        let store = Arc::clone(&store);
        async move {
            if file.relative.extension().is_none_or(|ext| ext != SIDECAR_EXTENSION) {
                return Ok(vec![file]);
            }

            let key = effective_key(&file.relative);
            let declared: Map<String, Value> = serde_json::from_slice(&file.contents)
                .map_err(|source| PipelineError::InvalidSidecar {
                    path: file.relative.clone(),
                    source,
                })?;

            let registered = store.register_first(key.clone(), declared.into_iter().collect());
            debug!(
                operation = "variables.collect",
                status = if registered { "registered" } else { "ignored" },
                identity = %file.relative.display(),
                key = %key,
                "sidecar consumed"
            );

            // Sidecars never reach later stages as compiled artifacts.
            Ok(Vec::new())
        }
    })
}
