/// The external compiler contract and the fixed compilation matrix
///
/// The pipeline never looks inside the compiler: it hands over source text
/// (with compile-time constants already spliced in) plus a resolved config
/// and receives code and an optional source map back.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::str::FromStr;

use crate::error::PipelineError;

/// Compilation target dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Es5,
    Es6,
}

impl Target {
    pub fn as_str(self) -> &'static str {
        match self {
            Target::Es5 => "es5",
            Target::Es6 => "es6",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "es5" => Ok(Target::Es5),
            "es6" => Ok(Target::Es6),
            other => Err(PipelineError::UnknownTarget(other.to_string())),
        }
    }
}

/// Compilation mode.
///
/// Debug keeps output readable, Release minifies but stays debuggable
/// through source maps, Production minifies and drops the maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Debug,
    Release,
    Production,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Debug => "Debug",
            Mode::Release => "Release",
            Mode::Production => "Production",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Debug" => Ok(Mode::Debug),
            "Release" => Ok(Mode::Release),
            "Production" => Ok(Mode::Production),
            other => Err(PipelineError::UnknownMode(other.to_string())),
        }
    }
}

/// The (target, mode) pair keying both the config matrix and the
/// per-identity cache bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Profile {
    pub target: Target,
    pub mode: Mode,
}

impl Profile {
    pub fn new(target: Target, mode: Mode) -> Self {
        Self { target, mode }
    }

    /// Resolve the compiler configuration for this profile.
    ///
    /// Six fixed configurations; es6 output needs no polyfilling.
    pub fn config(self) -> CompileConfig {
        match (self.target, self.mode) {
            (Target::Es5, Mode::Debug) => CompileConfig {
                polyfill: true,
                minify: false,
                source_maps: true,
            },
            (Target::Es5, Mode::Release) => CompileConfig {
                polyfill: true,
                minify: true,
                source_maps: true,
            },
            (Target::Es5, Mode::Production) => CompileConfig {
                polyfill: true,
                minify: true,
                source_maps: false,
            },
            (Target::Es6, Mode::Debug) => CompileConfig {
                polyfill: false,
                minify: false,
                source_maps: true,
            },
            (Target::Es6, Mode::Release) => CompileConfig {
                polyfill: false,
                minify: true,
                source_maps: true,
            },
            (Target::Es6, Mode::Production) => CompileConfig {
                polyfill: false,
                minify: true,
                source_maps: false,
            },
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.target, self.mode)
    }
}

/// Resolved compiler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileConfig {
    pub polyfill: bool,
    pub minify: bool,
    pub source_maps: bool,
}

/// Opaque compiled payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutput {
    pub code: String,
    pub source_map: Option<String>,
}

pub type CompileFuture = Pin<Box<dyn Future<Output = Result<CompileOutput, PipelineError>> + Send>>;

/// The opaque source-to-source compiler collaborator.
///
/// Treated as asynchronous even when an implementation is synchronous;
/// implementations report their own failures through `PipelineError::Compiler`.
pub trait Compiler: Send + Sync {
    fn compile(&self, source: &str, config: &CompileConfig, filename: &Path) -> CompileFuture;
}

/// Default compiler: returns the (already constant-substituted) source
/// unchanged and produces no map. Lets the binary run end-to-end without an
/// external transpiler; real transpilers plug in through the trait.
pub struct PassthroughCompiler;

impl Compiler for PassthroughCompiler {
    fn compile(&self, source: &str, _config: &CompileConfig, _filename: &Path) -> CompileFuture {
        let code = source.to_string();
        Box::pin(async move {
            Ok(CompileOutput {
                code,
                source_map: None,
            })
        })
    }
}
