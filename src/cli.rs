use clap::{Parser, Subcommand};

use crate::compiler::{Mode, Target};

/// Dopack - Version-stamped script packaging pipeline
///
/// Dopack collects script components in priority order, injects compile-time
/// constants, fans files out per compilation target, and memoizes compiled
/// output across runs.
#[derive(Parser, Debug)]
#[command(name = "dopack")]
#[command(author = "Tuist Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Version-stamped script packaging pipeline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile components into version-stamped target folders
    Build(BuildArgs),

    /// Delete version-stamped target folders from the output directory
    Clean(CleanArgs),

    /// List component manifests discovered under the root
    Components(ComponentsArgs),
}

#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Config file path
    #[arg(short = 'c', long, env = "DOPACK_CONFIG")]
    pub config: Option<String>,

    /// Component discovery root
    #[arg(long)]
    pub root: Option<String>,

    /// Component names in priority order, comma-separated
    #[arg(long, value_delimiter = ',')]
    pub components: Vec<String>,

    /// Output directory for compiled files
    #[arg(short = 'o', long)]
    pub output: Option<String>,

    /// Base URI injected into the entry file
    #[arg(long)]
    pub prefix: Option<String>,

    /// Compilation mode (Debug|Release|Production)
    #[arg(long, env = "DOPACK_CONFIGURATION")]
    pub mode: Option<Mode>,

    /// Compilation targets, comma-separated (es5, es6)
    #[arg(long, value_delimiter = ',')]
    pub targets: Vec<Target>,

    /// Disable compile memoization for this run
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Parser, Debug)]
pub struct CleanArgs {
    /// Config file path
    #[arg(short = 'c', long, env = "DOPACK_CONFIG")]
    pub config: Option<String>,

    /// Output directory to clean
    #[arg(short = 'o', long)]
    pub output: Option<String>,
}

#[derive(Parser, Debug)]
pub struct ComponentsArgs {
    /// Config file path
    #[arg(short = 'c', long, env = "DOPACK_CONFIG")]
    pub config: Option<String>,

    /// Component discovery root
    #[arg(long)]
    pub root: Option<String>,
}
