/// First-wins deduplication stage
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::asset::ScriptFile;
use crate::pipeline::step::Step;

/// Dedup by relative identity: the first file seen under a given identity
/// passes through unchanged, every later one is dropped. The seen-set is
/// owned by this stage and scoped to one pipeline invocation, so "first"
/// means "earliest in the priority-ordered input stream".
pub fn choose_first() -> Step<ScriptFile> {
    let seen = Arc::new(Mutex::new(HashSet::<PathBuf>::new()));
    Step::filter(move |file: &ScriptFile| {
        let mut seen = seen.lock().expect("dedup state poisoned");
        if seen.insert(file.relative.clone()) {
            Ok(true)
        } else {
            debug!(
                operation = "dedup",
                status = "dropped",
                identity = %file.relative.display(),
                "shadowed by an earlier source"
            );
            Ok(false)
        }
    })
}
