//! Isolated configuration synthesis.
//!
//! The synthesized tsconfig checks exactly the closure's files while keeping
//! every semantic of the original configuration. It never extends the
//! original: all options are inlined with relative paths made absolute, so
//! the file can live anywhere and the original project is never touched.

use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::cleanup::StagedFile;
use crate::config::{ConfigurationRecord, ModuleResolution};
use crate::config_value::{ConfigValue, OptionMap};
use crate::discovery::DependencyClosure;
use crate::fs::{
    BUILD_OUTPUT_DIRS, DEFAULT_EXCLUDES, DEPENDENCY_DIRS, absolutize, declaration_only_pattern,
    is_within, to_slash,
};

/// Where incremental build state goes when the user has not chosen a place.
pub const BUILD_INFO_SUBDIR: &str = "node_modules/.cache/tsfiles";

/// Options whose values are single paths relative to their declaring config.
const PATH_OPTIONS: [&str; 5] = ["rootDir", "outDir", "declarationDir", "outFile", "tsBuildInfoFile"];

/// Options whose values are arrays of paths.
const PATH_LIST_OPTIONS: [&str; 2] = ["rootDirs", "typeRoots"];

#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    /// Directory the synthesized file will be written to.
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IsolatedConfiguration {
    pub compiler_options: OptionMap,
    pub files: Vec<String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub references: Vec<String>,
}

impl IsolatedConfiguration {
    pub fn to_json(&self) -> Value {
        let mut root = Map::new();
        root.insert(
            "compilerOptions".to_string(),
            ConfigValue::Object(self.compiler_options.clone()).to_json(),
        );
        root.insert("files".to_string(), string_array(&self.files));
        root.insert("include".to_string(), string_array(&self.include));
        root.insert("exclude".to_string(), string_array(&self.exclude));
        if !self.references.is_empty() {
            let references = self
                .references
                .iter()
                .map(|path| serde_json::json!({ "path": path }))
                .collect();
            root.insert("references".to_string(), Value::Array(references));
        }
        Value::Object(root)
    }
}

fn string_array(values: &[String]) -> Value {
    Value::Array(values.iter().cloned().map(Value::String).collect())
}

pub fn synthesize(
    record: &ConfigurationRecord,
    closure: &DependencyClosure,
    options: &SynthesisOptions,
) -> IsolatedConfiguration {
    let mut compiler_options: OptionMap = record
        .options
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    for key in PATH_OPTIONS {
        if let Some(path) = record.option_path(key) {
            compiler_options.insert(key.to_string(), ConfigValue::String(to_slash(&path)));
        }
    }
    for key in PATH_LIST_OPTIONS {
        if let Some(value) = record.option(key) {
            let base = record.option_base(key);
            let absolute: Vec<String> = value
                .string_items()
                .iter()
                .map(|item| to_slash(&absolutize(base, item)))
                .collect();
            compiler_options.insert(key.to_string(), ConfigValue::from(absolute));
        }
    }

    if let Some(paths) = record.option("paths") {
        let base = path_mapping_base(record);
        compiler_options.insert("paths".to_string(), rewrite_path_mappings(paths, &base));
    }

    if record.module_resolution() == ModuleResolution::Bundler {
        compiler_options.shift_remove("baseUrl");
    } else if let Some(base_url) = record.option_path("baseUrl") {
        compiler_options.insert("baseUrl".to_string(), ConfigValue::String(to_slash(&base_url)));
    }

    if record.is_incremental() && record.option("tsBuildInfoFile").is_none() {
        compiler_options.insert(
            "tsBuildInfoFile".to_string(),
            ConfigValue::String(to_slash(&default_build_info_path(record))),
        );
    }

    if record.option("skipLibCheck").is_none() {
        compiler_options.insert("skipLibCheck".to_string(), ConfigValue::Bool(true));
    }

    if record.option("noEmit").is_none() && record.option("emitDeclarationOnly").is_none() {
        compiler_options.insert("noEmit".to_string(), ConfigValue::Bool(true));
    }

    if record.option("typeRoots").is_none() && options.output_dir != record.directory {
        let roots: Vec<String> = default_type_roots(&record.directory)
            .iter()
            .map(|root| to_slash(root))
            .collect();
        compiler_options.insert("typeRoots".to_string(), ConfigValue::from(roots));
    }

    IsolatedConfiguration {
        compiler_options,
        files: closure.source_files.iter().map(|file| to_slash(file)).collect(),
        include: declaration_includes(record),
        exclude: merged_excludes(record),
        references: record
            .references
            .iter()
            .map(|reference| to_slash(&reference.config_path))
            .collect(),
    }
}

/// Base directory of the `paths` table: `baseUrl` when present, otherwise
/// the directory of the configuration that declared `paths`.
pub fn path_mapping_base(record: &ConfigurationRecord) -> PathBuf {
    record
        .option_path("baseUrl")
        .unwrap_or_else(|| record.option_base("paths").to_path_buf())
}

/// Rewrite every target of a `paths` table to absolute form against `base`.
/// Already-absolute targets come back unchanged.
pub fn rewrite_path_mappings(paths: &ConfigValue, base: &Path) -> ConfigValue {
    let Some(table) = paths.as_object() else {
        return paths.clone();
    };
    let rewritten = table
        .iter()
        .map(|(pattern, targets)| {
            let targets = match targets {
                ConfigValue::Array(items) => ConfigValue::Array(
                    items
                        .iter()
                        .map(|item| match item {
                            ConfigValue::String(target) => {
                                ConfigValue::String(to_slash(&absolutize(base, target)))
                            }
                            other => other.clone(),
                        })
                        .collect(),
                ),
                other => other.clone(),
            };
            (pattern.clone(), targets)
        })
        .collect();
    ConfigValue::Object(rewritten)
}

pub fn default_build_info_path(record: &ConfigurationRecord) -> PathBuf {
    let stem = record
        .source_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tsconfig".to_string());
    record
        .directory
        .join(BUILD_INFO_SUBDIR)
        .join(format!("{stem}.tsbuildinfo"))
}

/// The `node_modules/@types` directories tsc would search from `dir`. When
/// none exist yet, the project's own location is still returned so the list
/// is never empty.
pub fn default_type_roots(dir: &Path) -> Vec<PathBuf> {
    let roots: Vec<PathBuf> = dir
        .ancestors()
        .map(|ancestor| ancestor.join("node_modules").join("@types"))
        .filter(|candidate| candidate.is_dir())
        .collect();
    if roots.is_empty() {
        vec![dir.join("node_modules").join("@types")]
    } else {
        roots
    }
}

/// Declaration-only subset of the include patterns, absolute.
pub fn declaration_includes(record: &ConfigurationRecord) -> Vec<String> {
    let (patterns, base) = match (&record.include, &record.files) {
        (Some(include), _) => (include.patterns.clone(), include.base_dir.clone()),
        (None, Some(_)) => return Vec::new(),
        (None, None) => (vec!["**/*".to_string()], record.directory.clone()),
    };
    let mut includes: Vec<String> = Vec::new();
    for pattern in patterns {
        let absolute = to_slash(&absolutize(&base, &declaration_only_pattern(&pattern)));
        if !includes.contains(&absolute) {
            includes.push(absolute);
        }
    }
    includes
}

/// User excludes plus dependency and build-output directories, absolute and
/// deduplicated. Without a user `exclude`, tsc's default excludes stand in
/// for it. A build directory the user explicitly includes is left out.
pub fn merged_excludes(record: &ConfigurationRecord) -> Vec<String> {
    let mut excludes: Vec<String> = Vec::new();
    let mut push = |value: String| {
        if !excludes.contains(&value) {
            excludes.push(value);
        }
    };

    match &record.exclude {
        Some(exclude) => {
            for pattern in &exclude.patterns {
                push(to_slash(&absolutize(&exclude.base_dir, pattern)));
            }
        }
        None => {
            for dir in DEFAULT_EXCLUDES {
                push(to_slash(&record.directory.join(dir)));
            }
        }
    }

    let included_roots = explicit_include_roots(record);
    let mut defaults: Vec<PathBuf> = DEPENDENCY_DIRS
        .iter()
        .chain(BUILD_OUTPUT_DIRS.iter())
        .map(|dir| record.directory.join(dir))
        .collect();
    defaults.extend(record.output_dirs());
    for dir in defaults {
        let explicitly_included = included_roots.iter().any(|root| is_within(root, &dir));
        if !explicitly_included {
            push(to_slash(&dir));
        }
    }
    excludes
}

/// Literal directory prefixes of the include patterns.
fn explicit_include_roots(record: &ConfigurationRecord) -> Vec<PathBuf> {
    let Some(include) = &record.include else {
        return Vec::new();
    };
    include
        .patterns
        .iter()
        .map(|pattern| {
            let pattern = pattern.replace('\\', "/");
            let literal: Vec<&str> = pattern
                .split('/')
                .take_while(|segment| !segment.contains(['*', '?']))
                .collect();
            absolutize(&include.base_dir, &literal.join("/"))
        })
        .filter(|root| root != &include.base_dir)
        .collect()
}

/// Directory to stage the synthesized file in: next to the original config
/// when writable, so default type-root lookup keeps working, else the system
/// temp directory.
pub fn staging_dir(record: &ConfigurationRecord) -> PathBuf {
    match tempfile::Builder::new()
        .prefix(".tsfiles-writable-")
        .tempfile_in(&record.directory)
    {
        Ok(_) => record.directory.clone(),
        Err(err) => {
            tracing::debug!(
                dir = %record.directory.display(),
                error = %err,
                "project directory not writable, staging synthesized config in temp dir"
            );
            std::env::temp_dir()
        }
    }
}

/// Write `config` as a scoped temp file in `dir`. The file is removed when
/// the returned handle drops, or by the termination handler if the process
/// is interrupted first.
pub fn write_isolated(config: &IsolatedConfiguration, dir: &Path) -> std::io::Result<StagedFile> {
    let file = tempfile::Builder::new()
        .prefix("tsconfig.tsfiles-")
        .suffix(".json")
        .tempfile_in(dir)?;
    let mut staged = StagedFile::new(file);
    let json = serde_json::to_vec_pretty(&config.to_json()).map_err(std::io::Error::other)?;
    if let Some(file) = staged.as_file_mut() {
        file.write_all(&json)?;
        file.flush()?;
    }
    Ok(staged)
}
