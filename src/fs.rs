//! Path and glob helpers shared by discovery, caching and synthesis.

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Directory names that hold third-party packages.
pub const DEPENDENCY_DIRS: [&str; 1] = ["node_modules"];

/// Conventional build-output directory names excluded even when the config
/// does not name them through `outDir`. Only direct children of the
/// configuration directory count.
pub const BUILD_OUTPUT_DIRS: [&str; 2] = ["dist", "build"];

/// Excluded by tsc when a config has no `exclude` of its own.
pub const DEFAULT_EXCLUDES: [&str; 3] = ["node_modules", "bower_components", "jspm_packages"];

const DECLARATION_SUFFIXES: [&str; 3] = [".d.ts", ".d.mts", ".d.cts"];
const TS_SOURCE_EXTENSIONS: [&str; 4] = ["ts", "tsx", "mts", "cts"];
const JS_SOURCE_EXTENSIONS: [&str; 4] = ["js", "jsx", "mjs", "cjs"];

/// Lexically resolve `.` and `..` without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::RootDir | Component::Normal(_) | Component::Prefix(_) => {
                normalized.push(component.as_os_str());
            }
        }
    }

    normalized
}

pub fn canonicalize_or_owned(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Join `value` onto `base` unless it is already absolute, then normalize.
pub fn absolutize(base: &Path, value: &str) -> PathBuf {
    let candidate = Path::new(value);
    if candidate.is_absolute() {
        normalize_path(candidate)
    } else {
        normalize_path(&base.join(candidate))
    }
}

/// Forward-slash rendering of a path, used for every comparison and for the
/// paths written into synthesized configs.
pub fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// True when any segment of `path` equals one of `names`.
pub fn has_segment(path: &Path, names: &[&str]) -> bool {
    to_slash(path)
        .split('/')
        .any(|segment| names.contains(&segment))
}

/// True when `path` lies at or below `dir`, compared on normalized
/// forward-slash strings.
/// True when `path` is inside `project_dir/dist` or `project_dir/build`.
pub fn is_in_build_output(path: &Path, project_dir: &Path) -> bool {
    BUILD_OUTPUT_DIRS
        .iter()
        .any(|name| is_within(path, &project_dir.join(name)))
}

pub fn is_within(path: &Path, dir: &Path) -> bool {
    let path = to_slash(path);
    let dir = to_slash(dir);
    let dir = dir.trim_end_matches('/');
    path == dir || path.starts_with(&format!("{dir}/"))
}

pub fn is_declaration_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    DECLARATION_SUFFIXES
        .iter()
        .any(|suffix| name.ends_with(suffix))
}

/// Whether `path` is something tsc would accept as a root file.
pub fn is_checkable_source(path: &Path, allow_js: bool) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    TS_SOURCE_EXTENSIONS.contains(&ext.as_str())
        || (allow_js && JS_SOURCE_EXTENSIONS.contains(&ext.as_str()))
}

/// Modification time in nanoseconds since the epoch, or 0 when the file is
/// gone. A deleted file still changes the fingerprint it contributes to.
pub fn mtime_nanos(path: &Path) -> u128 {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|duration| duration.as_nanos())
        .unwrap_or(0)
}

/// Probe whether the filesystem holding `dir` compares names
/// case-insensitively, by looking up a case-swapped spelling of an existing
/// entry.
pub fn is_case_insensitive_fs(dir: &Path) -> bool {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return cfg!(any(windows, target_os = "macos"));
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let swapped: String = name
            .chars()
            .map(|ch| {
                if ch.is_ascii_lowercase() {
                    ch.to_ascii_uppercase()
                } else {
                    ch.to_ascii_lowercase()
                }
            })
            .collect();
        if swapped == name {
            continue;
        }
        return dir.join(&swapped).exists();
    }
    cfg!(any(windows, target_os = "macos"))
}

/// Expand a tsconfig `include`/`exclude` entry into glob patterns.
///
/// tsconfig treats an entry whose last segment has no wildcard and no
/// extension as a directory, matching everything beneath it.
pub fn expand_config_pattern(pattern: &str) -> Vec<String> {
    let pattern = pattern.trim().replace('\\', "/");
    let pattern = pattern.trim_end_matches('/').to_string();
    if pattern.is_empty() {
        return Vec::new();
    }
    let last = pattern.rsplit('/').next().unwrap_or(&pattern);
    let has_wildcard = last.contains('*') || last.contains('?');
    let has_extension = last.contains('.') && last != "." && last != "..";
    if has_wildcard || has_extension {
        vec![pattern]
    } else {
        vec![pattern.clone(), format!("{pattern}/**/*")]
    }
}

/// Turn an include entry into the declaration-only subset of what it matches.
pub fn declaration_only_pattern(pattern: &str) -> String {
    let pattern = pattern.trim().replace('\\', "/");
    let pattern = pattern.trim_end_matches('/');
    let last = pattern.rsplit('/').next().unwrap_or(pattern);
    if is_declaration_pattern(last) {
        return pattern.to_string();
    }
    if last.ends_with('*') {
        return format!("{pattern}.d.ts");
    }
    for ext in ["tsx", "ts", "mts", "cts"] {
        if let Some(stem) = last.strip_suffix(&format!(".{ext}")) {
            let prefix = &pattern[..pattern.len() - last.len()];
            let decl = match ext {
                "mts" => "d.mts",
                "cts" => "d.cts",
                _ => "d.ts",
            };
            return format!("{prefix}{stem}.{decl}");
        }
    }
    format!("{pattern}/**/*.d.ts")
}

fn is_declaration_pattern(last: &str) -> bool {
    DECLARATION_SUFFIXES
        .iter()
        .any(|suffix| last.to_ascii_lowercase().ends_with(suffix))
}

/// Compile tsconfig-style patterns, each rooted at `base`, into a glob set
/// matched against absolute forward-slash paths.
pub fn build_glob_set(
    patterns: &[String],
    base: &Path,
    case_insensitive: bool,
) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        for expanded in expand_config_pattern(pattern) {
            let absolute = to_slash(&absolutize(base, &expanded));
            builder.add(compile_glob(&absolute, case_insensitive)?);
        }
    }
    builder.build()
}

fn compile_glob(pattern: &str, case_insensitive: bool) -> Result<Glob, globset::Error> {
    GlobBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .literal_separator(true)
        .backslash_escape(false)
        .build()
}
