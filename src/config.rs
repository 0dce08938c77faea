use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::compiler::{Mode, Target};

/// Complete Dopack configuration (loaded from TOML file)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DopackConfig {
    #[serde(default)]
    pub build: BuildConfig,
}

/// Build pipeline defaults; every field is overridable from the CLI.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BuildConfig {
    /// Component discovery root (defaults to the working directory)
    pub root: Option<String>,

    /// Component names in priority order; the earliest declaration of a
    /// relative path wins during dedup
    #[serde(default)]
    pub components: Vec<String>,

    /// Output directory for compiled files
    pub output: Option<String>,

    /// Base URI injected into the entry file
    pub prefix: Option<String>,

    /// Compilation mode (Debug, Release, Production)
    pub mode: Option<Mode>,

    /// Compilation targets (es5, es6)
    #[serde(default)]
    pub targets: Vec<Target>,
}

impl DopackConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

/// Discovers Dopack configuration by traversing up the directory tree
pub fn discover_config(start_dir: &Path) -> Result<Option<PathBuf>> {
    let mut current = start_dir.to_path_buf();

    loop {
        let config_path = current.join("dopack.toml");
        if config_path.exists() {
            return Ok(Some(config_path));
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    // Fallback to global config
    if let Some(home) = dirs::home_dir() {
        let global_config = home.join(".config/dopack/config.toml");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}

/// Loads configuration with auto-discovery support
///
/// If `explicit_path` is provided, loads config from that path. Otherwise
/// auto-discovers by traversing up from the working directory. Returns
/// Ok(None) when nothing is found.
pub fn load_config_with_discovery(explicit_path: Option<&str>) -> Result<Option<DopackConfig>> {
    if let Some(config_path) = explicit_path {
        Ok(Some(DopackConfig::from_file(config_path)?))
    } else {
        let current_dir = std::env::current_dir()
            .context("Failed to get current directory for config discovery")?;

        if let Some(discovered_path) = discover_config(&current_dir)? {
            Ok(Some(DopackConfig::from_file(&discovered_path)?))
        } else {
            Ok(None)
        }
    }
}
