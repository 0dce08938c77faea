// Library interface for Dopack
// This allows acceptance tests and external build wiring to use the pipeline

pub mod asset;
pub mod cache;
pub mod cli;
pub mod commands;
pub mod compiler;
pub mod components;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;

// Re-export commonly used types
pub use asset::{ScriptFile, Variables};
pub use cache::{CompileCache, MtimeCache, PassthroughCache};
pub use compiler::{CompileOutput, Compiler, Mode, PassthroughCompiler, Profile, Target};
pub use error::PipelineError;
pub use pipeline::{build_pipeline, run_files, PipelineOptions, Step};
