/// Component manifest discovery and priority-ordered file streaming
///
/// A component is a named source root declared by a `component.json`
/// manifest. The locator resolves the requested component names, in caller
/// order, into one flat file sequence; that ordering is what the dedup
/// stage's "first source wins" policy relies on.
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::asset::ScriptFile;
use crate::error::PipelineError;

/// Manifest file name recognized during discovery.
pub const MANIFEST_FILE: &str = "component.json";

/// Dependency-staging directory excluded from every traversal.
const STAGING_DIR: &str = "node_modules";

const SCRIPT_EXTENSIONS: [&str; 2] = ["js", "json"];

/// A named, path-rooted source grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub name: String,
    pub path: PathBuf,
    pub manifest: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    name: Option<String>,
    path: Option<String>,
}

/// A manifest holds one declaration or an array of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Manifest {
    One(ManifestEntry),
    Many(Vec<ManifestEntry>),
}

impl Manifest {
    fn entries(self) -> Vec<ManifestEntry> {
        match self {
            Manifest::One(entry) => vec![entry],
            Manifest::Many(entries) => entries,
        }
    }
}

fn is_staging_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name() == STAGING_DIR
}

fn sorted_walk(root: &Path) -> walkdir::IntoIter {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
}

/// Discover every component declared under `root`.
///
/// Missing and duplicate names are fatal configuration errors; duplicates
/// are detected across the whole discovery before any file is streamed.
pub fn discover_components(root: &Path) -> Result<Vec<Component>, PipelineError> {
    let mut components: Vec<Component> = Vec::new();
    let mut by_name: HashMap<String, PathBuf> = HashMap::new();

    let mut walker = sorted_walk(root);
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            match e.into_io_error() {
                Some(source) => PipelineError::fs(path, source),
                None => PipelineError::fs(
                    path,
                    std::io::Error::other("filesystem loop during discovery"),
                ),
            }
        })?;
        if is_staging_dir(&entry) {
            walker.skip_current_dir();
            continue;
        }
        if !entry.file_type().is_file() || entry.file_name() != MANIFEST_FILE {
            continue;
        }

        let manifest_path = entry.path().to_path_buf();
        let manifest_dir = manifest_path
            .parent()
            .unwrap_or(root)
            .to_path_buf();
        let raw = fs::read(&manifest_path)
            .map_err(|source| PipelineError::fs(&manifest_path, source))?;
        let manifest: Manifest =
            serde_json::from_slice(&raw).map_err(|source| PipelineError::InvalidManifest {
                path: manifest_path.clone(),
                source,
            })?;

        for declared in manifest.entries() {
            let name = declared
                .name
                .filter(|name| !name.is_empty())
                .ok_or_else(|| PipelineError::MissingComponentName(manifest_path.clone()))?;
            let path = match declared.path {
                Some(p) if Path::new(&p).is_absolute() => PathBuf::from(p),
                Some(p) => manifest_dir.join(p),
                None => manifest_dir.clone(),
            };

            if let Some(first) = by_name.get(&name) {
                return Err(PipelineError::DuplicateComponentName {
                    name,
                    first: first.clone(),
                    second: manifest_path.clone(),
                });
            }
            by_name.insert(name.clone(), manifest_path.clone());

            debug!(
                operation = "components.discover",
                component = %name,
                path = %path.display(),
                "manifest resolved"
            );
            components.push(Component {
                name,
                path,
                manifest: manifest_path.clone(),
            });
        }
    }

    Ok(components)
}

/// Stream every script file under one component root as pipeline units
/// relative to that root.
///
/// Sidecars are emitted ahead of scripts: the chain drives each item through
/// every stage before the next item starts, so a sidecar must enter the
/// pipeline before the sibling script it declares variables for.
fn stream_component(component: &Component) -> Result<Vec<ScriptFile>, PipelineError> {
    let mut sidecars = Vec::new();
    let mut scripts = Vec::new();

    let mut walker = sorted_walk(&component.path);
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(&component.path).to_path_buf();
            match e.into_io_error() {
                Some(source) => PipelineError::fs(path, source),
                None => PipelineError::fs(
                    path,
                    std::io::Error::other("filesystem loop during traversal"),
                ),
            }
        })?;
        if is_staging_dir(&entry) {
            walker.skip_current_dir();
            continue;
        }
        if !entry.file_type().is_file() || entry.file_name() == MANIFEST_FILE {
            continue;
        }
        let extension_matches = entry
            .path()
            .extension()
            .is_some_and(|ext| SCRIPT_EXTENSIONS.iter().any(|known| ext == *known));
        if !extension_matches {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(&component.path)
            .unwrap_or(entry.path())
            .to_path_buf();
        let file = ScriptFile::load(entry.path(), relative)?;
        if entry.path().extension().is_some_and(|ext| ext == "json") {
            sidecars.push(file);
        } else {
            scripts.push(file);
        }
    }

    sidecars.extend(scripts);
    Ok(sidecars)
}

/// Resolve the requested component names, in caller priority order, into a
/// single flat, ordered file sequence.
pub fn collect_component_files(
    root: &Path,
    names: &[String],
) -> Result<Vec<ScriptFile>, PipelineError> {
    let components = discover_components(root)?;
    let by_name: HashMap<&str, &Component> = components
        .iter()
        .map(|c| (c.name.as_str(), c))
        .collect();

    let mut files = Vec::new();
    for name in names {
        let component = by_name
            .get(name.as_str())
            .ok_or_else(|| PipelineError::UnknownComponent(name.clone()))?;
        let streamed = stream_component(component)?;
        debug!(
            operation = "components.stream",
            component = %name,
            file_count = streamed.len(),
            "component streamed"
        );
        files.extend(streamed);
    }
    Ok(files)
}
