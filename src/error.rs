/// Pipeline error taxonomy
///
/// Every failure is fatal for the enclosing pipeline invocation; there is no
/// retry anywhere in the core. Output already emitted before the failure
/// point is not rolled back.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("component manifest {} does not declare a name", .0.display())]
    MissingComponentName(PathBuf),

    #[error(
        "duplicate component name '{name}' declared by {} and {}",
        .first.display(),
        .second.display()
    )]
    DuplicateComponentName {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("component '{0}' was not found during manifest discovery")]
    UnknownComponent(String),

    #[error("invalid component manifest {}", .path.display())]
    InvalidManifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported file contents for {}: not valid UTF-8 text", .0.display())]
    UnsupportedPayload(PathBuf),

    #[error("invalid sidecar variables in {}", .path.display())]
    InvalidSidecar {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported value for compile time argument '{name}' in {}", .identity.display())]
    UnsupportedSubstitution { name: String, identity: PathBuf },

    #[error("compiling {} produced no output", .0.display())]
    EmptyOutput(PathBuf),

    #[error("compiling {} failed: {message}", .identity.display())]
    Compiler { identity: PathBuf, message: String },

    #[error("{} reached the compile stage without a target tag", .0.display())]
    MissingTarget(PathBuf),

    #[error("unrecognized compilation mode '{0}'")]
    UnknownMode(String),

    #[error("unrecognized compilation target '{0}'")]
    UnknownTarget(String),

    #[error("filesystem error on {}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Wrap an io error together with the path it occurred on.
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}
