//! Finding the tsconfig that governs each input file.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::config::CONFIG_FILE_NAME;
use crate::error::ConfigError;
use crate::fs::{canonicalize_or_owned, normalize_path};

/// Environment variable naming an explicit tsconfig, honored exactly like
/// `--project`.
pub const PROJECT_ENV: &str = "TSFILES_PROJECT";

/// Resolve an explicit `--project`/`TSFILES_PROJECT` value. Directories mean
/// the `tsconfig.json` inside them.
pub fn resolve_override(cwd: &Path, project: &Path) -> Result<PathBuf, ConfigError> {
    let mut candidate = if project.is_absolute() {
        project.to_path_buf()
    } else {
        cwd.join(project)
    };

    if candidate.is_dir() {
        candidate = candidate.join(CONFIG_FILE_NAME);
    }

    if !candidate.exists() {
        return Err(ConfigError::OverrideNotFound {
            path: normalize_path(&candidate),
        });
    }

    if !candidate.is_file() {
        return Err(ConfigError::OverrideNotAFile { path: candidate });
    }

    Ok(canonicalize_or_owned(&candidate))
}

/// Nearest `tsconfig.json` at or above `start_dir`.
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    start_dir
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
        .map(|candidate| canonicalize_or_owned(&candidate))
}

/// Locate the governing configuration for files under `start_dir`.
pub fn locate(
    cwd: &Path,
    start_dir: &Path,
    explicit_override: Option<&Path>,
) -> Result<PathBuf, ConfigError> {
    if let Some(project) = explicit_override {
        return resolve_override(cwd, project);
    }
    find_config(start_dir).ok_or_else(|| ConfigError::NotFound {
        start: start_dir.to_path_buf(),
    })
}

/// Files that share a governing configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedGroup {
    pub config_path: PathBuf,
    pub root_files: BTreeSet<PathBuf>,
}

/// A file whose configuration could not be located.
#[derive(Debug)]
pub struct Unlocated {
    pub file: PathBuf,
    pub error: ConfigError,
}

/// Group input files by governing configuration.
///
/// With an override every file lands in a single group regardless of where
/// it lives. Otherwise each file is located independently; files whose
/// search fails are returned separately so the other groups still run.
pub fn group_files(
    cwd: &Path,
    files: &[PathBuf],
    explicit_override: Option<&Path>,
) -> Result<(Vec<LocatedGroup>, Vec<Unlocated>), ConfigError> {
    let absolute: Vec<PathBuf> = files
        .iter()
        .map(|file| {
            let joined = if file.is_absolute() {
                file.clone()
            } else {
                cwd.join(file)
            };
            canonicalize_or_owned(&normalize_path(&joined))
        })
        .collect();

    if let Some(project) = explicit_override {
        let config_path = resolve_override(cwd, project)?;
        let group = LocatedGroup {
            config_path,
            root_files: absolute.into_iter().collect(),
        };
        return Ok((vec![group], Vec::new()));
    }

    let mut groups: BTreeMap<PathBuf, BTreeSet<PathBuf>> = BTreeMap::new();
    let mut unlocated = Vec::new();
    for file in absolute {
        let start = file.parent().unwrap_or(cwd);
        match locate(cwd, start, None) {
            Ok(config_path) => {
                groups.entry(config_path).or_default().insert(file);
            }
            Err(error) => unlocated.push(Unlocated { file, error }),
        }
    }

    let groups = groups
        .into_iter()
        .map(|(config_path, root_files)| LocatedGroup {
            config_path,
            root_files,
        })
        .collect();
    Ok((groups, unlocated))
}
