//! Type-check a subset of a TypeScript project's files under that project's
//! own `tsconfig.json`.
//!
//! Input files are grouped by governing configuration, each group is expanded
//! to its dependency closure, and a throwaway configuration listing exactly
//! that closure is handed to `tsc` or `tsgo`.

// Merged configuration values
pub mod config_value;
pub use config_value::{ConfigValue, OptionMap};

// Errors shared across the pipeline
pub mod error;
pub use error::{CheckError, CheckResult, ConfigError, ExecError};

// Path and glob helpers
pub mod fs;
#[cfg(test)]
#[path = "tests/fs_tests.rs"]
mod fs_tests;

// Staged file removal on interrupt
pub mod cleanup;
#[cfg(test)]
#[path = "tests/cleanup_tests.rs"]
mod cleanup_tests;

// tsconfig loading and extends merging
pub mod config;
pub use config::{ConfigurationRecord, ModuleResolution, PatternSet, ProjectReference};
#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod config_tests;

// Governing configuration lookup and file grouping
pub mod locator;
#[cfg(test)]
#[path = "tests/locator_tests.rs"]
mod locator_tests;

// Import specifier scanning
pub mod imports;
#[cfg(test)]
#[path = "tests/imports_tests.rs"]
mod imports_tests;

// Specifier resolution for discovery
pub mod resolve;
#[cfg(test)]
#[path = "tests/resolve_tests.rs"]
mod resolve_tests;

// Ambient declaration globbing
pub mod ambient;
#[cfg(test)]
#[path = "tests/ambient_tests.rs"]
mod ambient_tests;

// Closure cache
pub mod cache;
pub use cache::{CacheKey, ClosureCache};
#[cfg(test)]
#[path = "tests/cache_tests.rs"]
mod cache_tests;

// Dependency closure discovery
pub mod discovery;
pub use discovery::{DependencyClosure, ImportGraphLoader, ProgramLoader};
#[cfg(test)]
#[path = "tests/discovery_tests.rs"]
mod discovery_tests;

// Isolated configuration synthesis
pub mod synthesize;
pub use synthesize::{IsolatedConfiguration, SynthesisOptions};
#[cfg(test)]
#[path = "tests/synthesize_tests.rs"]
mod synthesize_tests;

// Compiler processes
pub mod compiler;
pub use compiler::{CompilerChoice, CompilerPaths, CompilerRunner, ProcessRunner};
#[cfg(test)]
#[path = "tests/compiler_tests.rs"]
mod compiler_tests;

// Compiler output parsing
pub mod diagnostics;
pub use diagnostics::{Diagnostic, DiagnosticSeverity};
#[cfg(test)]
#[path = "tests/diagnostics_tests.rs"]
mod diagnostics_tests;

// Variant selection and fallback
pub mod selector;
pub use selector::{CompilerOverride, ExecutionState};
#[cfg(test)]
#[path = "tests/selector_tests.rs"]
mod selector_tests;

// Top-level check driver
pub mod driver;
pub use driver::{CheckOptions, CheckReport, Checker, DiscoveryMode, GroupReport};
#[cfg(test)]
#[path = "tests/driver_tests.rs"]
mod driver_tests;

// Terminal output
pub mod reporter;
pub use reporter::Reporter;
#[cfg(test)]
#[path = "tests/reporter_tests.rs"]
mod reporter_tests;

// Logging setup for binaries
pub mod tracing_config;

// Shared fixtures for unit tests
#[cfg(test)]
#[path = "tests/test_fixtures.rs"]
pub(crate) mod test_fixtures;
