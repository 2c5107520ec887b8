use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use tsfiles::driver::{CheckOptions, DiscoveryMode};
use tsfiles::locator::PROJECT_ENV;
use tsfiles::selector::CompilerOverride;

/// CLI arguments for the tsfiles binary.
#[derive(Parser, Debug)]
#[command(
    name = "tsfiles",
    version,
    about = "Type-check specific TypeScript files with their project's tsconfig"
)]
pub struct CliArgs {
    /// Files to check. Each is checked under the nearest tsconfig.json.
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    /// Path to tsconfig.json or a directory containing it. Applies to every file.
    #[arg(short = 'p', long, env = PROJECT_ENV)]
    pub project: Option<PathBuf>,

    /// Which compiler to run.
    #[arg(long, value_enum, default_value_t = CompilerArg::Auto, ignore_case = true)]
    pub compiler: CompilerArg,

    /// Do not retry with tsc when tsgo fails to run.
    #[arg(long = "no-fallback")]
    pub no_fallback: bool,

    /// Seconds before a compiler process is killed.
    #[arg(long, value_name = "SECONDS", default_value_t = 60)]
    pub timeout: u64,

    /// Directory for cached dependency closures.
    #[arg(long = "cache-dir", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Disable the dependency closure cache.
    #[arg(long = "no-cache")]
    pub no_cache: bool,

    /// How the dependency closure is discovered.
    #[arg(long, value_enum, default_value_t = DiscoveryArg::ImportGraph)]
    pub discovery: DiscoveryArg,

    /// Explicit path to the tsc binary.
    #[arg(long, value_name = "PATH")]
    pub tsc: Option<PathBuf>,

    /// Explicit path to the tsgo binary.
    #[arg(long, value_name = "PATH")]
    pub tsgo: Option<PathBuf>,

    /// Log per-group progress to stderr.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Print the synthesized configuration for each group instead of checking.
    #[arg(long = "show-config", alias = "showConfig", conflicts_with = "list_files")]
    pub show_config: bool,

    /// Print the files each group would check instead of checking.
    #[arg(long = "list-files", alias = "listFilesOnly")]
    pub list_files: bool,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Disable colored output.
    #[arg(long = "no-color")]
    pub no_color: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompilerArg {
    Auto,
    #[value(alias = "tsc")]
    Standard,
    #[value(alias = "tsgo")]
    Fast,
}

impl From<CompilerArg> for CompilerOverride {
    fn from(value: CompilerArg) -> Self {
        match value {
            CompilerArg::Auto => CompilerOverride::Auto,
            CompilerArg::Standard => CompilerOverride::Standard,
            CompilerArg::Fast => CompilerOverride::Fast,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DiscoveryArg {
    ImportGraph,
    Compiler,
}

impl From<DiscoveryArg> for DiscoveryMode {
    fn from(value: DiscoveryArg) -> Self {
        match value {
            DiscoveryArg::ImportGraph => DiscoveryMode::ImportGraph,
            DiscoveryArg::Compiler => DiscoveryMode::Compiler,
        }
    }
}

impl CliArgs {
    pub fn check_options(&self) -> CheckOptions {
        CheckOptions {
            project: self.project.clone(),
            compiler: self.compiler.into(),
            fallback: !self.no_fallback,
            timeout: Duration::from_secs(self.timeout),
            cache_dir: self.cache_dir.clone(),
            no_cache: self.no_cache,
            discovery: self.discovery.into(),
            tsc_path: self.tsc.clone(),
            tsgo_path: self.tsgo.clone(),
            verbose: self.verbose,
        }
    }
}
