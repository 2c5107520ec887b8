//! Check driver: groups input files, runs each group through discovery,
//! synthesis and the compiler, and folds the results into one report.
//!
//! Groups are independent and run on the rayon pool. A failure in one group
//! is recorded in its [`GroupReport`] and never stops the others.

use rayon::prelude::*;
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::ClosureCache;
use crate::compiler::{CompilerChoice, CompilerPaths, CompilerRunner, ProcessRunner};
use crate::config::{self, ConfigurationRecord};
use crate::diagnostics::{Diagnostic, error_count, warning_count};
use crate::discovery::{
    CompilerListLoader, DependencyClosure, ImportGraphLoader, ProgramLoader, discover,
};
use crate::error::{CheckError, CheckResult, ConfigError};
use crate::fs::is_checkable_source;
use crate::locator::{LocatedGroup, group_files};
use crate::selector::{CompilerOverride, CompilerSelector, ExecutionState};
use crate::synthesize::{SynthesisOptions, staging_dir, synthesize, write_isolated};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// How closure discovery builds the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscoveryMode {
    /// Walk imports natively.
    #[default]
    ImportGraph,
    /// Ask the standard compiler via `--listFilesOnly`.
    Compiler,
}

#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Explicit tsconfig (file or directory) applied to every input.
    pub project: Option<PathBuf>,
    pub compiler: CompilerOverride,
    /// Retry with the standard compiler when an automatically chosen fast
    /// run fails as a tool.
    pub fallback: bool,
    pub timeout: Duration,
    /// Where closure cache entries are stored. `None` uses the system temp
    /// directory.
    pub cache_dir: Option<PathBuf>,
    pub no_cache: bool,
    pub discovery: DiscoveryMode,
    pub tsc_path: Option<PathBuf>,
    pub tsgo_path: Option<PathBuf>,
    pub verbose: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        CheckOptions {
            project: None,
            compiler: CompilerOverride::Auto,
            fallback: true,
            timeout: DEFAULT_TIMEOUT,
            cache_dir: None,
            no_cache: false,
            discovery: DiscoveryMode::ImportGraph,
            tsc_path: None,
            tsgo_path: None,
            verbose: false,
        }
    }
}

pub fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("tsfiles").join("closures")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Config,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&CheckError> for GroupFailure {
    fn from(err: &CheckError) -> Self {
        GroupFailure {
            kind: if err.is_config() {
                FailureKind::Config
            } else {
                FailureKind::System
            },
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    /// `None` when no configuration could be located.
    pub config_path: Option<PathBuf>,
    pub root_files: Vec<PathBuf>,
    pub files_checked: usize,
    pub compiler: Option<CompilerChoice>,
    pub transitions: Vec<ExecutionState>,
    pub retried: bool,
    pub from_cache: bool,
    pub degraded: bool,
    pub error_count: usize,
    pub warning_count: usize,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<GroupFailure>,
}

impl GroupReport {
    fn failed(config_path: Option<PathBuf>, root_files: Vec<PathBuf>, err: &CheckError) -> Self {
        GroupReport {
            config_path,
            root_files,
            files_checked: 0,
            compiler: None,
            transitions: Vec::new(),
            retried: false,
            from_cache: false,
            degraded: false,
            error_count: 0,
            warning_count: 0,
            duration: Duration::ZERO,
            failure: Some(GroupFailure::from(err)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub success: bool,
    pub error_count: usize,
    pub warning_count: usize,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    /// Every file the compiler was given, across all groups.
    pub files_checked: Vec<PathBuf>,
    pub groups: Vec<GroupReport>,
}

impl CheckReport {
    /// 0 clean, 1 type errors, 2 configuration or system failure. The worst
    /// outcome across groups wins.
    pub fn exit_code(&self) -> i32 {
        if self.groups.iter().any(|group| group.failure.is_some()) {
            2
        } else if self.error_count > 0 {
            1
        } else {
            0
        }
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// One group's input as seen before any configuration is merged.
#[derive(Debug)]
enum GroupInput {
    Located(LocatedGroup),
    Failed {
        root_files: Vec<PathBuf>,
        error: ConfigError,
    },
}

/// Per-group result of a planning operation.
#[derive(Debug)]
pub struct GroupView<T> {
    pub config_path: Option<PathBuf>,
    pub root_files: Vec<PathBuf>,
    pub result: CheckResult<T>,
}

/// A group whose configuration merged and whose closure is known.
#[derive(Debug, Clone)]
pub struct PreparedGroup {
    pub record: ConfigurationRecord,
    pub roots: BTreeSet<PathBuf>,
    pub closure: DependencyClosure,
}

pub struct Checker {
    options: CheckOptions,
    runner: Arc<dyn CompilerRunner>,
    loader: Option<Arc<dyn ProgramLoader>>,
    compilers: Option<CompilerPaths>,
    cache: Option<ClosureCache>,
}

impl Checker {
    pub fn new(options: CheckOptions) -> Self {
        let cache = if options.no_cache {
            None
        } else {
            let dir = options.cache_dir.clone().unwrap_or_else(default_cache_dir);
            Some(ClosureCache::persistent(&dir))
        };
        Checker {
            options,
            runner: Arc::new(ProcessRunner),
            loader: None,
            compilers: None,
            cache,
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn CompilerRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Use `loader` for every group instead of the one `discovery` selects.
    pub fn with_loader(mut self, loader: Arc<dyn ProgramLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Skip binary lookup and use these compilers for every group.
    pub fn with_compilers(mut self, compilers: CompilerPaths) -> Self {
        self.compilers = Some(compilers);
        self
    }

    pub fn with_cache(mut self, cache: Option<ClosureCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn options(&self) -> &CheckOptions {
        &self.options
    }

    pub fn cache(&self) -> Option<&ClosureCache> {
        self.cache.as_ref()
    }

    /// Type-check `files`, resolved against `cwd`.
    pub fn check_files(&self, cwd: &Path, files: &[PathBuf]) -> CheckReport {
        let start = Instant::now();
        let inputs = self.group_inputs(cwd, files);
        tracing::debug!(files = files.len(), groups = inputs.len(), "checking file groups");

        let outcomes: Vec<(GroupReport, Vec<Diagnostic>, Vec<PathBuf>)> = inputs
            .into_par_iter()
            .map(|input| self.check_group(input))
            .collect();

        let mut diagnostics = Vec::new();
        let mut checked: BTreeSet<PathBuf> = BTreeSet::new();
        let mut groups = Vec::with_capacity(outcomes.len());
        for (report, group_diagnostics, group_files) in outcomes {
            diagnostics.extend(group_diagnostics);
            checked.extend(group_files);
            groups.push(report);
        }

        let errors = error_count(&diagnostics);
        let warnings = warning_count(&diagnostics);
        let failed = groups.iter().any(|group| group.failure.is_some());
        CheckReport {
            success: errors == 0 && !failed,
            error_count: errors,
            warning_count: warnings,
            diagnostics,
            duration: start.elapsed(),
            files_checked: checked.into_iter().collect(),
            groups,
        }
    }

    /// The synthesized configuration each group would be checked with.
    pub fn show_config(&self, cwd: &Path, files: &[PathBuf]) -> Vec<GroupView<serde_json::Value>> {
        self.plan(cwd, files, |prepared| {
            let options = SynthesisOptions {
                output_dir: prepared.record.directory.clone(),
            };
            Ok(synthesize(&prepared.record, &prepared.closure, &options).to_json())
        })
    }

    /// Each group's dependency closure.
    pub fn list_files(&self, cwd: &Path, files: &[PathBuf]) -> Vec<GroupView<DependencyClosure>> {
        self.plan(cwd, files, |prepared| Ok(prepared.closure))
    }

    fn plan<T, F>(&self, cwd: &Path, files: &[PathBuf], finish: F) -> Vec<GroupView<T>>
    where
        T: Send,
        F: Fn(PreparedGroup) -> CheckResult<T> + Sync,
    {
        self.group_inputs(cwd, files)
            .into_par_iter()
            .map(|input| match input {
                GroupInput::Located(group) => GroupView {
                    config_path: Some(group.config_path.clone()),
                    root_files: group.root_files.iter().cloned().collect(),
                    result: self.prepare(&group).and_then(&finish),
                },
                GroupInput::Failed { root_files, error } => GroupView {
                    config_path: None,
                    root_files,
                    result: Err(error.into()),
                },
            })
            .collect()
    }

    fn group_inputs(&self, cwd: &Path, files: &[PathBuf]) -> Vec<GroupInput> {
        match group_files(cwd, files, self.options.project.as_deref()) {
            Ok((located, unlocated)) => located
                .into_iter()
                .map(GroupInput::Located)
                .chain(unlocated.into_iter().map(|unlocated| GroupInput::Failed {
                    root_files: vec![unlocated.file],
                    error: unlocated.error,
                }))
                .collect(),
            Err(error) => vec![GroupInput::Failed {
                root_files: files.to_vec(),
                error,
            }],
        }
    }

    /// Merge the group's configuration, validate its roots and discover the
    /// closure.
    pub fn prepare(&self, group: &LocatedGroup) -> CheckResult<PreparedGroup> {
        let record = config::merge(&group.config_path)?;
        validate_roots(&record, &group.root_files)?;
        let loader = self.loader_for(&record);
        let closure = discover(&record, &group.root_files, loader.as_ref(), self.cache.as_ref());
        Ok(PreparedGroup {
            record,
            roots: group.root_files.clone(),
            closure,
        })
    }

    fn loader_for(&self, record: &ConfigurationRecord) -> Arc<dyn ProgramLoader> {
        if let Some(loader) = &self.loader {
            return Arc::clone(loader);
        }
        if self.options.discovery == DiscoveryMode::Compiler {
            match self.compilers_for(record).standard {
                Some(program) => {
                    return Arc::new(CompilerListLoader {
                        runner: Arc::clone(&self.runner),
                        program,
                        timeout: self.options.timeout,
                    });
                }
                None => tracing::warn!(
                    config = %record.source_path.display(),
                    "standard compiler not found, discovering closure from imports"
                ),
            }
        }
        Arc::new(ImportGraphLoader::default())
    }

    fn compilers_for(&self, record: &ConfigurationRecord) -> CompilerPaths {
        match &self.compilers {
            Some(paths) => paths.clone(),
            None => CompilerPaths::locate(
                self.options.tsc_path.as_deref(),
                self.options.tsgo_path.as_deref(),
                &record.directory,
            ),
        }
    }

    fn check_group(&self, input: GroupInput) -> (GroupReport, Vec<Diagnostic>, Vec<PathBuf>) {
        let group = match input {
            GroupInput::Located(group) => group,
            GroupInput::Failed { root_files, error } => {
                let err = CheckError::from(error);
                tracing::warn!(error = %err, "file group could not be configured");
                return (GroupReport::failed(None, root_files, &err), Vec::new(), Vec::new());
            }
        };

        let start = Instant::now();
        let config_path = Some(group.config_path.clone());
        let root_files: Vec<PathBuf> = group.root_files.iter().cloned().collect();
        let prepared = match self.prepare(&group) {
            Ok(prepared) => prepared,
            Err(err) => {
                tracing::warn!(config = %group.config_path.display(), error = %err, "file group failed");
                let mut report = GroupReport::failed(config_path, root_files, &err);
                report.duration = start.elapsed();
                return (report, Vec::new(), Vec::new());
            }
        };

        let compilers = self.compilers_for(&prepared.record);
        let selector = CompilerSelector {
            paths: &compilers,
            runner: self.runner.as_ref(),
            preference: self.options.compiler,
            fallback: self.options.fallback,
            timeout: self.options.timeout,
        };

        let staging = staging_dir(&prepared.record);
        let isolated = synthesize(
            &prepared.record,
            &prepared.closure,
            &SynthesisOptions {
                output_dir: staging.clone(),
            },
        );
        let mut report = GroupReport {
            config_path,
            root_files,
            files_checked: prepared.closure.source_files.len(),
            compiler: None,
            transitions: Vec::new(),
            retried: false,
            from_cache: prepared.closure.from_cache,
            degraded: prepared.closure.degraded,
            error_count: 0,
            warning_count: 0,
            duration: Duration::ZERO,
            failure: None,
        };

        // Dropping `scoped` removes the synthesized file; an interrupt before
        // then is handled by `cleanup::install_termination_handler`.
        let scoped = match write_isolated(&isolated, &staging) {
            Ok(file) => file,
            Err(source) => {
                let err = CheckError::SynthesizedConfig { source };
                report.failure = Some(GroupFailure::from(&err));
                report.duration = start.elapsed();
                return (report, Vec::new(), Vec::new());
            }
        };
        let outcome = selector.execute(&prepared.record, scoped.path());
        drop(scoped);

        report.transitions = outcome.transitions;
        report.retried = outcome.retried;
        report.duration = start.elapsed();
        let (diagnostics, checked) = match outcome.result {
            Ok(run) => {
                report.compiler = Some(run.choice);
                report.error_count = error_count(&run.diagnostics);
                report.warning_count = warning_count(&run.diagnostics);
                let checked = prepared.closure.source_files.into_iter().collect();
                (run.diagnostics, checked)
            }
            Err(err) => {
                tracing::warn!(
                    config = %prepared.record.source_path.display(),
                    error = %err,
                    "compiler execution failed"
                );
                report.failure = Some(GroupFailure::from(&err));
                (Vec::new(), Vec::new())
            }
        };

        if self.options.verbose {
            tracing::info!(
                config = %prepared.record.source_path.display(),
                compiler = ?report.compiler,
                files = report.files_checked,
                errors = report.error_count,
                elapsed_ms = report.duration.as_millis() as u64,
                "group checked"
            );
        } else {
            tracing::debug!(
                config = %prepared.record.source_path.display(),
                compiler = ?report.compiler,
                files = report.files_checked,
                errors = report.error_count,
                elapsed_ms = report.duration.as_millis() as u64,
                "group checked"
            );
        }
        (report, diagnostics, checked)
    }
}

/// Reject roots that do not exist or that tsc would not accept.
fn validate_roots(record: &ConfigurationRecord, roots: &BTreeSet<PathBuf>) -> Result<(), ConfigError> {
    let allow_js = record.allows_js();
    for root in roots {
        if !root.is_file() {
            return Err(ConfigError::InputNotFound { path: root.clone() });
        }
        if !is_checkable_source(root, allow_js) {
            return Err(ConfigError::UnsupportedInput { path: root.clone() });
        }
    }
    Ok(())
}
