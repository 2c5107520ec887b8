//! Module specifier resolution for closure discovery.
//!
//! Only specifiers that can land inside the project matter here: relative
//! paths, `paths` aliases, `baseUrl` lookups and triple-slash path
//! references. Bare package names fall through to `node_modules`, which the
//! closure excludes anyway, so they are not followed.

use std::path::{Path, PathBuf};

use crate::config::{ConfigurationRecord, ModuleResolution};
use crate::config_value::ConfigValue;
use crate::fs::{absolutize, canonicalize_or_owned, is_within, normalize_path};
use crate::imports::{ModuleSpecifier, SpecifierKind};

const TS_EXTENSION_CANDIDATES: [&str; 7] = ["ts", "tsx", "d.ts", "mts", "cts", "d.mts", "d.cts"];
const JS_EXTENSION_CANDIDATES: [&str; 4] = ["js", "jsx", "mjs", "cjs"];

/// One entry of `compilerOptions.paths`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapping {
    pub pattern: String,
    prefix: String,
    suffix: String,
    pub targets: Vec<String>,
}

impl PathMapping {
    pub fn new(pattern: &str, targets: Vec<String>) -> Self {
        let pattern = pattern.trim().replace('\\', "/");
        let (prefix, suffix) = match pattern.find('*') {
            Some(star) => (pattern[..star].to_string(), pattern[star + 1..].to_string()),
            None => (pattern.clone(), String::new()),
        };
        PathMapping {
            pattern,
            prefix,
            suffix,
            targets,
        }
    }

    /// The text matched by `*`, or an empty string for exact patterns.
    pub fn match_specifier(&self, specifier: &str) -> Option<String> {
        if !self.pattern.contains('*') {
            return (self.pattern == specifier).then(String::new);
        }

        if !specifier.starts_with(&self.prefix) || !specifier.ends_with(&self.suffix) {
            return None;
        }

        let start = self.prefix.len();
        let end = specifier.len().saturating_sub(self.suffix.len());
        if end < start {
            return None;
        }

        Some(specifier[start..end].to_string())
    }

    fn specificity(&self) -> usize {
        self.prefix.len() + self.suffix.len()
    }
}

/// Parse a `paths` table value into mappings, skipping malformed entries.
pub fn path_mappings(paths: &ConfigValue) -> Vec<PathMapping> {
    let Some(table) = paths.as_object() else {
        return Vec::new();
    };
    table
        .iter()
        .filter_map(|(pattern, targets)| {
            let targets = targets.string_items();
            (!targets.is_empty()).then(|| PathMapping::new(pattern, targets))
        })
        .collect()
}

/// Most specific mapping for `specifier`: longest literal prefix+suffix,
/// then longest pattern, then lexical order.
pub fn select_path_mapping<'a>(
    mappings: &'a [PathMapping],
    specifier: &str,
) -> Option<(&'a PathMapping, String)> {
    mappings
        .iter()
        .filter_map(|mapping| {
            mapping
                .match_specifier(specifier)
                .map(|wildcard| (mapping, wildcard))
        })
        .max_by(|(left, _), (right, _)| {
            left.specificity()
                .cmp(&right.specificity())
                .then_with(|| left.pattern.len().cmp(&right.pattern.len()))
                .then_with(|| right.pattern.cmp(&left.pattern))
        })
}

pub fn substitute_path_target(target: &str, wildcard: &str) -> String {
    if target.contains('*') {
        target.replace('*', wildcard)
    } else {
        target.to_string()
    }
}

/// Output locations of a referenced composite project.
#[derive(Debug, Clone)]
pub struct ReferencedProject {
    pub directory: PathBuf,
    pub root_dir: PathBuf,
    pub declaration_dir: Option<PathBuf>,
}

impl ReferencedProject {
    pub fn from_record(record: &ConfigurationRecord) -> Self {
        ReferencedProject {
            directory: record.directory.clone(),
            root_dir: record
                .option_path("rootDir")
                .unwrap_or_else(|| record.directory.clone()),
            declaration_dir: record
                .option_path("declarationDir")
                .or_else(|| record.option_path("outDir")),
        }
    }

    /// Built declaration file standing in for `source`, when it exists.
    fn declaration_output(&self, source: &Path) -> Option<PathBuf> {
        let out_dir = self.declaration_dir.as_ref()?;
        let relative = source.strip_prefix(&self.root_dir).ok()?;
        let name = relative.file_name()?.to_string_lossy().into_owned();
        let stem = strip_source_extension(&name)?;
        let output = out_dir.join(relative).with_file_name(format!("{stem}.d.ts"));
        output.is_file().then_some(output)
    }
}

fn strip_source_extension(name: &str) -> Option<&str> {
    if name.ends_with(".d.ts") {
        return None;
    }
    [".tsx", ".ts", ".mts", ".cts"]
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
}

/// Resolution context derived once per configuration.
#[derive(Debug, Clone)]
pub struct Resolver {
    resolution: ModuleResolution,
    allow_js: bool,
    base_url: Option<PathBuf>,
    mappings: Vec<PathMapping>,
    mappings_base: PathBuf,
    references: Vec<ReferencedProject>,
}

impl Resolver {
    pub fn new(record: &ConfigurationRecord, references: Vec<ReferencedProject>) -> Self {
        let base_url = record.option_path("baseUrl");
        let mappings_base = base_url
            .clone()
            .unwrap_or_else(|| record.option_base("paths").to_path_buf());
        Resolver {
            resolution: record.module_resolution(),
            allow_js: record.allows_js(),
            base_url,
            mappings: record.option("paths").map(path_mappings).unwrap_or_default(),
            mappings_base,
            references,
        }
    }

    pub fn resolve(&self, from_file: &Path, specifier: &ModuleSpecifier) -> Option<PathBuf> {
        let text = specifier.text.replace('\\', "/");
        let from_dir = from_file.parent()?;
        let resolved = match specifier.kind {
            SpecifierKind::ReferenceTypes => None,
            SpecifierKind::ReferencePath => {
                let target = absolutize(from_dir, &text);
                if target.is_file() {
                    Some(target)
                } else {
                    self.first_existing(&target)
                }
            }
            SpecifierKind::Static | SpecifierKind::Dynamic | SpecifierKind::Require => {
                self.resolve_module(from_dir, &text)
            }
        }?;
        let resolved = canonicalize_or_owned(&resolved);
        Some(self.redirect_to_reference(resolved))
    }

    fn resolve_module(&self, from_dir: &Path, specifier: &str) -> Option<PathBuf> {
        if specifier.starts_with('.') || Path::new(specifier).is_absolute() {
            return self.first_existing(&absolutize(from_dir, specifier));
        }
        if specifier.starts_with('#') {
            return None;
        }

        if let Some((mapping, wildcard)) = select_path_mapping(&self.mappings, specifier) {
            // A matched alias never falls back to other strategies.
            return mapping.targets.iter().find_map(|target| {
                let substituted = substitute_path_target(target, &wildcard);
                self.first_existing(&absolutize(&self.mappings_base, &substituted))
            });
        }

        if let Some(base_url) = self.base_url.as_ref() {
            if let Some(found) = self.first_existing(&base_url.join(specifier)) {
                return Some(found);
            }
        }

        if self.resolution == ModuleResolution::Classic {
            for ancestor in from_dir.ancestors() {
                if let Some(found) = self.first_existing(&ancestor.join(specifier)) {
                    return Some(found);
                }
            }
        }

        None
    }

    fn first_existing(&self, base: &Path) -> Option<PathBuf> {
        self.candidates(base).into_iter().find(|path| path.is_file())
    }

    fn candidates(&self, path: &Path) -> Vec<PathBuf> {
        let base = normalize_path(path);
        let mut candidates = Vec::new();

        if let Some(extension) = base.extension().and_then(|ext| ext.to_str()) {
            let replacements: &[&str] = match extension {
                "js" => &["ts", "tsx", "d.ts"],
                "jsx" => &["tsx", "d.ts"],
                "mjs" => &["mts", "d.mts"],
                "cjs" => &["cts", "d.cts"],
                _ => &[],
            };
            candidates.extend(replacements.iter().map(|ext| base.with_extension(ext)));
            let keeps_extension = TS_EXTENSION_CANDIDATES.contains(&extension)
                || (self.allow_js && JS_EXTENSION_CANDIDATES.contains(&extension));
            if keeps_extension {
                candidates.push(base.clone());
            }
        }

        let extensions = self.extensions();
        for ext in &extensions {
            candidates.push(append_extension(&base, ext));
        }
        if self.resolution != ModuleResolution::Classic {
            for ext in &extensions {
                candidates.push(base.join("index").with_extension(ext));
            }
        }
        candidates
    }

    fn extensions(&self) -> Vec<&'static str> {
        let mut extensions: Vec<&'static str> = TS_EXTENSION_CANDIDATES.to_vec();
        if self.allow_js {
            extensions.extend(JS_EXTENSION_CANDIDATES);
        }
        extensions
    }

    fn redirect_to_reference(&self, resolved: PathBuf) -> PathBuf {
        self.references
            .iter()
            .filter(|project| is_within(&resolved, &project.directory))
            .find_map(|project| project.declaration_output(&resolved))
            .unwrap_or(resolved)
    }
}

/// `foo.service` + `ts` must give `foo.service.ts`, not `foo.ts`.
fn append_extension(base: &Path, ext: &str) -> PathBuf {
    let mut with_extension = base.as_os_str().to_os_string();
    with_extension.push(".");
    with_extension.push(ext);
    PathBuf::from(with_extension)
}
