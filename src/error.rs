//! Error taxonomy for a check run.
//!
//! Configuration errors are fatal for the affected file group. System errors
//! come from the compiler subprocess or from the scoped synthesized config.
//! Discovery degradation and cache failures never surface here: they are
//! recovered where they happen and only logged.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::compiler::CompilerChoice;

/// Failures while locating or merging a `tsconfig.json`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "no tsconfig.json found in {start} or any parent directory; pass --project or set TSFILES_PROJECT"
    )]
    NotFound { start: PathBuf },

    #[error("tsconfig override not found at {}", path.display())]
    OverrideNotFound { path: PathBuf },

    #[error("project path is not a file: {}", path.display())]
    OverrideNotAFile { path: PathBuf },

    #[error("failed to read tsconfig {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse tsconfig {} at line {line}, column {column}: {message}", path.display())]
    Syntax {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("tsconfig {} extends '{reference}', which could not be found", config.display())]
    MissingExtends { config: PathBuf, reference: String },

    #[error("tsconfig extends cycle detected: {}", format_chain(chain))]
    CircularExtends { chain: Vec<PathBuf> },

    #[error("input file not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    #[error("input file {} is not a TypeScript source file", path.display())]
    UnsupportedInput { path: PathBuf },
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Failures launching or supervising a compiler process.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} did not finish within {}s and was terminated", program.display(), timeout.as_secs())]
    Timeout { program: PathBuf, timeout: Duration },

    #[error("i/o error while supervising {}: {source}", program.display())]
    Io {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level error for one file group.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{choice} compiler is not available on this host")]
    CompilerUnavailable { choice: CompilerChoice },

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("{choice} compiler exited with status {status} without reporting diagnostics:\n{output}")]
    CompilerCrashed {
        choice: CompilerChoice,
        status: String,
        output: String,
    },

    #[error("failed to write synthesized tsconfig: {source}")]
    SynthesizedConfig {
        #[source]
        source: std::io::Error,
    },
}

impl CheckError {
    /// Configuration-kind errors are user-actionable; everything else is a
    /// system failure.
    pub fn is_config(&self) -> bool {
        matches!(self, CheckError::Config(_))
    }
}

pub type CheckResult<T> = Result<T, CheckError>;
