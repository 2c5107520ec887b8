//! Globbing for ambient declaration files.
//!
//! A `.d.ts` that nobody imports can still add globals or augment modules, so
//! import-graph discovery alone misses it. Every declaration file matched by
//! the configuration's include patterns joins the closure.

use globset::GlobSet;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::ConfigurationRecord;
use crate::fs::{
    DEFAULT_EXCLUDES, DEPENDENCY_DIRS, absolutize, build_glob_set, has_segment,
    is_case_insensitive_fs, is_declaration_file, is_in_build_output, is_within, to_slash,
};

/// Include pattern used when discovery has to fall back.
pub const WILDCARD_AMBIENT_PATTERN: &str = "**/*.d.ts";

/// Resolved include/exclude rules for one configuration.
#[derive(Debug, Clone)]
pub struct AmbientRules {
    pub include: Vec<String>,
    pub include_base: PathBuf,
    pub exclude: Vec<String>,
    pub exclude_base: PathBuf,
    /// Directories pruned outright (dependencies and build output).
    pub pruned_dirs: Vec<PathBuf>,
    /// Configuration directory; `dist` and `build` directly below it are pruned.
    pub project_dir: PathBuf,
}

impl AmbientRules {
    /// Rules tsc itself would apply to `record`'s include/exclude.
    pub fn from_record(record: &ConfigurationRecord) -> Self {
        let (include, include_base) = match (&record.include, &record.files) {
            (Some(include), _) => (include.patterns.clone(), include.base_dir.clone()),
            // An explicit `files` list without `include` globs nothing.
            (None, Some(files)) => (Vec::new(), files.base_dir.clone()),
            (None, None) => (vec!["**/*".to_string()], record.directory.clone()),
        };
        let (exclude, exclude_base) = match &record.exclude {
            Some(exclude) => (exclude.patterns.clone(), exclude.base_dir.clone()),
            None => (
                DEFAULT_EXCLUDES.iter().map(|dir| dir.to_string()).collect(),
                record.directory.clone(),
            ),
        };
        AmbientRules {
            include,
            include_base,
            exclude,
            exclude_base,
            pruned_dirs: record.output_dirs(),
            project_dir: record.directory.clone(),
        }
    }

    /// Conservative rules used when discovery failed: every declaration file
    /// under the configuration directory.
    pub fn wildcard(record: &ConfigurationRecord) -> Self {
        let mut rules = Self::from_record(record);
        rules.include = vec![WILDCARD_AMBIENT_PATTERN.to_string()];
        rules.include_base = record.directory.clone();
        rules
    }
}

/// Every ambient declaration file matched by `rules`.
///
/// Errors compiling a pattern are logged and that rule set yields nothing
/// rather than failing the check.
pub fn glob_ambient(rules: &AmbientRules) -> BTreeSet<PathBuf> {
    let mut found = BTreeSet::new();
    if rules.include.is_empty() {
        return found;
    }

    let case_insensitive = is_case_insensitive_fs(&rules.include_base);
    let include = match build_glob_set(&rules.include, &rules.include_base, case_insensitive) {
        Ok(set) => set,
        Err(err) => {
            tracing::warn!(error = %err, "invalid include pattern, skipping ambient discovery");
            return found;
        }
    };
    let exclude = match build_glob_set(&rules.exclude, &rules.exclude_base, case_insensitive) {
        Ok(set) => set,
        Err(err) => {
            tracing::warn!(error = %err, "invalid exclude pattern, ignoring excludes");
            GlobSet::empty()
        }
    };

    for root in walk_roots(&rules.include, &rules.include_base) {
        // An include rooted inside `build/` walks it anyway.
        let prune_build = !is_in_build_output(&root, &rules.project_dir);
        let walker = WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                let path = entry.path();
                let name = entry.file_name().to_string_lossy();
                !(name.starts_with('.')
                    || DEPENDENCY_DIRS.contains(&name.as_ref())
                    || (prune_build && is_in_build_output(path, &rules.project_dir))
                    || rules.pruned_dirs.iter().any(|dir| is_within(path, dir))
                    || exclude.is_match(to_slash(path)))
            });

        for entry in walker.filter_map(Result::ok) {
            if !entry.file_type().is_file() || !is_declaration_file(entry.path()) {
                continue;
            }
            let path = entry.path();
            if has_segment(path, &DEPENDENCY_DIRS) {
                continue;
            }
            let slash = to_slash(path);
            if include.is_match(&slash) && !exclude.is_match(&slash) {
                found.insert(path.to_path_buf());
            }
        }
    }

    found
}

/// Directories to walk: the literal prefix of each include pattern, with
/// nested prefixes collapsed into their ancestor.
fn walk_roots(patterns: &[String], base: &Path) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = patterns
        .iter()
        .map(|pattern| {
            let pattern = pattern.replace('\\', "/");
            let literal: Vec<&str> = pattern
                .split('/')
                .take_while(|segment| !segment.contains(['*', '?', '[', '{']))
                .collect();
            let mut root = absolutize(base, &literal.join("/"));
            if root.is_file() || (root.extension().is_some() && !root.is_dir()) {
                root.pop();
            }
            root
        })
        .filter(|root| root.is_dir())
        .collect();
    roots.sort();
    roots.dedup();

    let mut collapsed: Vec<PathBuf> = Vec::new();
    for root in roots {
        if !collapsed.iter().any(|kept| is_within(&root, kept)) {
            collapsed.push(root);
        }
    }
    collapsed
}
