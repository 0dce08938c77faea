/// Units of work flowing through the pipeline
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::compiler::Target;
use crate::error::PipelineError;

/// Variable context bound to a file: logical name to JSON scalar.
///
/// Compared by deep value equality during cache validation; an absent
/// context and an empty context are equivalent.
pub type Variables = BTreeMap<String, Value>;

/// Whether a value may be spliced into source text as a compile-time
/// constant. Arrays and objects are rejected at the point of substitution.
pub fn is_scalar(value: &Value) -> bool {
    matches!(
        value,
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
    )
}

/// A script file travelling through the pipeline stages.
///
/// `relative` is the dedup and sidecar key (path relative to the source
/// root). `source_path` is the stable identity used for cache lookups: it
/// never changes, so fanned-out copies resolve to the same cache bucket as
/// their origin.
#[derive(Debug, Clone)]
pub struct ScriptFile {
    pub relative: PathBuf,
    pub source_path: PathBuf,
    pub contents: Vec<u8>,
    /// Compilation target this copy belongs to, assigned during fan-out.
    pub target: Option<Target>,
    /// Output location relative to the output root.
    pub destination: PathBuf,
    /// Variables injected by the pipeline during fan-out. Sidecar-declared
    /// variables live in the invocation's variable store, not here.
    pub variables: Variables,
    /// Map-tracking state. `Some` means the caller initialized source-map
    /// tracking and a compiler-produced map may be attached.
    pub source_map: Option<String>,
}

impl ScriptFile {
    pub fn new(source_path: impl Into<PathBuf>, relative: impl Into<PathBuf>, contents: Vec<u8>) -> Self {
        let relative = relative.into();
        Self {
            destination: relative.clone(),
            relative,
            source_path: source_path.into(),
            contents,
            target: None,
            variables: Variables::new(),
            source_map: None,
        }
    }

    /// Read a file from disk into a pipeline unit.
    pub fn load(source_path: impl Into<PathBuf>, relative: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let source_path = source_path.into();
        let contents =
            fs::read(&source_path).map_err(|source| PipelineError::fs(&source_path, source))?;
        Ok(Self::new(source_path, relative, contents))
    }

    /// Copy constructor used by target fan-out.
    ///
    /// The copy is an independent value; only the stable `source_path`
    /// identity is shared with the origin.
    pub fn fan_out(&self, target: Target, destination: PathBuf, variables: Variables) -> Self {
        Self {
            relative: self.relative.clone(),
            source_path: self.source_path.clone(),
            contents: self.contents.clone(),
            target: Some(target),
            destination,
            variables,
            source_map: self.source_map.clone(),
        }
    }

    /// Contents as text. Anything that is not valid UTF-8 is an unsupported
    /// payload and fails the invocation.
    pub fn text(&self) -> Result<&str, PipelineError> {
        std::str::from_utf8(&self.contents)
            .map_err(|_| PipelineError::UnsupportedPayload(self.relative.clone()))
    }

    /// Key under which a sidecar declares variables for this file: the
    /// relative identity minus its extension.
    pub fn variable_key(&self) -> String {
        path_key(&self.relative.with_extension(""))
    }

    /// Key under which a directory-global sidecar applies to this file: the
    /// base name of the containing directory (empty at the root).
    pub fn directory_key(&self) -> String {
        directory_key(&self.relative)
    }
}

pub(crate) fn path_key(path: &Path) -> String {
    let mut key = String::new();
    for component in path.components() {
        if !key.is_empty() {
            key.push('/');
        }
        key.push_str(&component.as_os_str().to_string_lossy());
    }
    key
}

pub(crate) fn directory_key(relative: &Path) -> String {
    relative
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
