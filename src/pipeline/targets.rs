/// Target fan-out stage
use serde_json::json;
use std::path::{Path, PathBuf};

use crate::asset::{ScriptFile, Variables};
use crate::compiler::Target;
use crate::pipeline::step::Step;

/// The distinguished entry file. It is never duplicated per target: the one
/// instance is compiled for the canonical es5 target and carries enough
/// injected metadata (version, prefix, requested target set) for the
/// compiler to embed multi-target dispatch.
pub const ENTRY_FILE: &str = "api.js";

/// Fan each file out into one tagged copy per requested target, rewriting
/// destinations into `<target>_<version>` folders. The version token was
/// resolved once for the whole run, so every copy shares the same stamp.
pub fn fan_out_targets(version: String, prefix: String, targets: Vec<Target>) -> Step<ScriptFile> {
    Step::new(move |file: ScriptFile| {
        let version = version.clone();
        let prefix = prefix.clone();
        let targets = targets.clone();
        async move {
            if file.relative == Path::new(ENTRY_FILE) {
                let mut entry = file;
                entry.target = Some(Target::Es5);
                entry.variables = Variables::from([
                    ("version".to_string(), json!(version)),
                    ("prefix".to_string(), json!(prefix)),
                    ("isES6".to_string(), json!(targets.contains(&Target::Es6))),
                ]);
                return Ok(vec![entry]);
            }

            Ok(targets
                .iter()
                .map(|&target| {
                    let destination = PathBuf::from(format!("{}_{}", target.as_str(), version))
                        .join(&file.relative);
                    file.fan_out(target, destination, Variables::new())
                })
                .collect())
        }
    })
}
