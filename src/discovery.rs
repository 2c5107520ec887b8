//! Dependency closure discovery.
//!
//! The closure of a root set is everything the compiler must load to check
//! those roots the way a full-project build would: the import graph, files
//! reached through `paths` aliases and project references, and every ambient
//! declaration file in scope.

use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::ambient::{AmbientRules, glob_ambient};
use crate::cache::{CacheKey, ClosureCache};
use crate::cleanup::StagedFile;
use crate::compiler::{CompilerRunner, Invocation};
use crate::config::{self, ConfigurationRecord};
use crate::fs::{DEPENDENCY_DIRS, has_segment, is_in_build_output, is_within, to_slash};
use crate::imports::scan_specifiers;
use crate::resolve::{ReferencedProject, Resolver};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to read root file {}: {source}", path.display())]
    ReadRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("program has more than {limit} files")]
    TooManyFiles { limit: usize },

    #[error("failed to write discovery tsconfig: {source}")]
    DiscoveryConfig {
        #[source]
        source: std::io::Error,
    },

    #[error("compiler could not list program files: {message}")]
    Compiler { message: String },
}

/// Everything the compiler needs to see for one file group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyClosure {
    pub source_files: BTreeSet<PathBuf>,
    /// Declaration files that are in the closure only for their global
    /// effects.
    pub ambient_files: BTreeSet<PathBuf>,
    pub discovery_duration: Duration,
    pub from_cache: bool,
    /// Program construction failed and the closure is the conservative
    /// fallback.
    pub degraded: bool,
}

/// Program construction: the files the compiler would load for `roots`.
pub trait ProgramLoader: Send + Sync {
    fn load_program(
        &self,
        record: &ConfigurationRecord,
        roots: &BTreeSet<PathBuf>,
    ) -> Result<BTreeSet<PathBuf>, DiscoveryError>;
}

/// Walks the import graph natively, resolving specifiers with the
/// configuration's module resolution settings.
#[derive(Debug, Clone)]
pub struct ImportGraphLoader {
    pub max_files: usize,
}

impl Default for ImportGraphLoader {
    fn default() -> Self {
        ImportGraphLoader { max_files: 50_000 }
    }
}

impl ImportGraphLoader {
    fn referenced_projects(record: &ConfigurationRecord) -> Vec<ReferencedProject> {
        record
            .references
            .iter()
            .filter_map(|reference| match config::merge(&reference.config_path) {
                Ok(referenced) => Some(ReferencedProject::from_record(&referenced)),
                Err(err) => {
                    tracing::debug!(
                        reference = %reference.config_path.display(),
                        error = %err,
                        "skipping unreadable project reference"
                    );
                    None
                }
            })
            .collect()
    }
}

impl ProgramLoader for ImportGraphLoader {
    fn load_program(
        &self,
        record: &ConfigurationRecord,
        roots: &BTreeSet<PathBuf>,
    ) -> Result<BTreeSet<PathBuf>, DiscoveryError> {
        let resolver = Resolver::new(record, Self::referenced_projects(record));
        let mut visited: BTreeSet<PathBuf> = BTreeSet::new();
        let mut pending: VecDeque<PathBuf> = roots.iter().cloned().collect();

        while let Some(file) = pending.pop_front() {
            if !visited.insert(file.clone()) {
                continue;
            }
            if visited.len() > self.max_files {
                return Err(DiscoveryError::TooManyFiles {
                    limit: self.max_files,
                });
            }

            let text = match std::fs::read_to_string(&file) {
                Ok(text) => text,
                Err(source) if roots.contains(&file) => {
                    return Err(DiscoveryError::ReadRoot { path: file, source });
                }
                Err(err) => {
                    tracing::debug!(file = %file.display(), error = %err, "skipping unreadable import");
                    continue;
                }
            };

            for specifier in scan_specifiers(&text) {
                let Some(target) = resolver.resolve(&file, &specifier) else {
                    continue;
                };
                if has_segment(&target, &DEPENDENCY_DIRS) || visited.contains(&target) {
                    continue;
                }
                pending.push_back(target);
            }
        }

        Ok(visited)
    }
}

/// Asks the compiler itself for the program's file list via
/// `--listFilesOnly`, using a throwaway config that extends the real one.
pub struct CompilerListLoader {
    pub runner: Arc<dyn CompilerRunner>,
    pub program: PathBuf,
    pub timeout: Duration,
}

impl ProgramLoader for CompilerListLoader {
    fn load_program(
        &self,
        record: &ConfigurationRecord,
        roots: &BTreeSet<PathBuf>,
    ) -> Result<BTreeSet<PathBuf>, DiscoveryError> {
        let document = serde_json::json!({
            "extends": to_slash(&record.source_path),
            "files": roots.iter().map(|root| to_slash(root)).collect::<Vec<_>>(),
            "include": [],
        });
        let temp = write_discovery_config(&record.directory, &document)
            .map_err(|source| DiscoveryError::DiscoveryConfig { source })?;

        let invocation = Invocation {
            program: self.program.clone(),
            args: vec![
                "--listFilesOnly".into(),
                "--project".into(),
                temp.path().as_os_str().to_os_string(),
            ],
            cwd: record.directory.clone(),
            timeout: self.timeout,
        };
        let output = self
            .runner
            .run(&invocation)
            .map_err(|err| DiscoveryError::Compiler {
                message: err.to_string(),
            })?;

        let files: BTreeSet<PathBuf> = output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .filter(|path| path.is_absolute())
            .collect();
        if files.is_empty() {
            return Err(DiscoveryError::Compiler {
                message: format!(
                    "no files listed (exit status {})",
                    output.status_label()
                ),
            });
        }
        Ok(files)
    }
}

fn write_discovery_config(dir: &Path, document: &serde_json::Value) -> std::io::Result<StagedFile> {
    use std::io::Write;

    let file = tempfile::Builder::new()
        .prefix("tsconfig.tsfiles-discovery-")
        .suffix(".json")
        .tempfile_in(dir)?;
    let mut staged = StagedFile::new(file);
    let json = serde_json::to_vec_pretty(document).map_err(std::io::Error::other)?;
    if let Some(file) = staged.as_file_mut() {
        file.write_all(&json)?;
        file.flush()?;
    }
    Ok(staged)
}

/// Compute the closure for `roots` under `record`.
///
/// Never fails: when program construction breaks, the closure degrades to
/// the roots plus every declaration file under the configuration directory.
pub fn discover(
    record: &ConfigurationRecord,
    roots: &BTreeSet<PathBuf>,
    loader: &dyn ProgramLoader,
    cache: Option<&ClosureCache>,
) -> DependencyClosure {
    let start = Instant::now();
    let ambient = glob_ambient(&AmbientRules::from_record(record));
    let key = CacheKey::new(record, roots);

    let cached = cache.and_then(|cache| cache.get(&key, &ambient));
    let from_cache = cached.is_some();
    let (explicit, ambient, degraded) = match cached {
        Some(explicit) => (explicit, ambient, false),
        None => match loader.load_program(record, roots) {
            Ok(explicit) => {
                if let Some(cache) = cache {
                    cache.put(key, &explicit, &ambient);
                }
                (explicit, ambient, false)
            }
            Err(err) => {
                tracing::warn!(
                    config = %record.source_path.display(),
                    error = %err,
                    "program construction failed, falling back to roots plus all declaration files"
                );
                let wildcard = glob_ambient(&AmbientRules::wildcard(record));
                (roots.clone(), wildcard, true)
            }
        },
    };

    let excluded_dirs = record.output_dirs();
    let keep = |path: &PathBuf| !is_excluded(path, &record.directory, &excluded_dirs);

    let ambient_files: BTreeSet<PathBuf> = ambient.into_iter().filter(keep).collect();
    let mut source_files: BTreeSet<PathBuf> = roots.clone();
    source_files.extend(explicit.into_iter().filter(keep));
    source_files.extend(ambient_files.iter().cloned());

    let closure = DependencyClosure {
        source_files,
        ambient_files,
        discovery_duration: start.elapsed(),
        from_cache,
        degraded,
    };
    tracing::debug!(
        config = %record.source_path.display(),
        roots = roots.len(),
        files = closure.source_files.len(),
        ambient = closure.ambient_files.len(),
        from_cache,
        degraded,
        elapsed_ms = closure.discovery_duration.as_millis() as u64,
        "closure discovered"
    );
    closure
}

/// Under a dependency directory, a conventional build-output directory of the
/// project, or one of the configuration's own output directories.
///
/// `dist` and `build` only count as direct children of `project_dir`; a
/// source folder such as `src/build` stays in the closure.
pub fn is_excluded(path: &Path, project_dir: &Path, output_dirs: &[PathBuf]) -> bool {
    has_segment(path, &DEPENDENCY_DIRS)
        || output_dirs.iter().any(|dir| is_within(path, dir))
        || is_in_build_output(path, project_dir)
}
