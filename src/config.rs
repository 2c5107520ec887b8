//! Loading and merging `tsconfig.json` files.
//!
//! The merge follows `extends` chains (a single reference or an array of
//! them), lets later layers override earlier ones key by key, and remembers
//! which file declared each option so relative paths can later be resolved
//! against the right directory.

use rustc_hash::{FxHashMap, FxHasher};
use serde_json::Value;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use crate::config_value::{ConfigValue, OptionMap, normalize_option};
use crate::error::ConfigError;
use crate::fs::{absolutize, canonicalize_or_owned};

pub const CONFIG_FILE_NAME: &str = "tsconfig.json";

/// Patterns from `include`, `exclude` or `files`, relative to the directory
/// of the configuration that declared them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSet {
    pub patterns: Vec<String>,
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectReference {
    /// Absolute path of the referenced project's tsconfig.
    pub config_path: PathBuf,
    pub prepend: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleResolution {
    Classic,
    Node10,
    Node16,
    NodeNext,
    Bundler,
}

impl ModuleResolution {
    pub fn parse(value: &str) -> Option<Self> {
        match normalize_option(value).as_str() {
            "classic" => Some(ModuleResolution::Classic),
            "node" | "node10" => Some(ModuleResolution::Node10),
            "node16" => Some(ModuleResolution::Node16),
            "nodenext" => Some(ModuleResolution::NodeNext),
            "bundler" => Some(ModuleResolution::Bundler),
            _ => None,
        }
    }

    pub fn is_legacy(self) -> bool {
        matches!(self, ModuleResolution::Classic | ModuleResolution::Node10)
    }
}

/// Fully merged configuration for one tsconfig file.
#[derive(Debug, Clone)]
pub struct ConfigurationRecord {
    pub source_path: PathBuf,
    pub directory: PathBuf,
    pub options: OptionMap,
    /// Directory of the configuration that declared each option.
    pub option_origins: FxHashMap<String, PathBuf>,
    pub include: Option<PatternSet>,
    pub exclude: Option<PatternSet>,
    pub files: Option<PatternSet>,
    pub references: Vec<ProjectReference>,
    pub is_composite: bool,
    /// Hash over the text of every file in the extends chain.
    pub content_hash: u64,
    /// Configs that contributed to this record, child first.
    pub extends_chain: Vec<PathBuf>,
}

impl ConfigurationRecord {
    pub fn option(&self, key: &str) -> Option<&ConfigValue> {
        self.options.get(key).filter(|value| !value.is_null())
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.option(key)
            .and_then(ConfigValue::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn option_bool(&self, key: &str) -> Option<bool> {
        self.option(key).and_then(ConfigValue::as_bool)
    }

    /// Directory relative paths in `key` are resolved against.
    pub fn option_base(&self, key: &str) -> &Path {
        self.option_origins
            .get(key)
            .map(PathBuf::as_path)
            .unwrap_or(&self.directory)
    }

    /// Absolute form of a path-valued option.
    pub fn option_path(&self, key: &str) -> Option<PathBuf> {
        self.option_str(key)
            .map(|value| absolutize(self.option_base(key), value))
    }

    pub fn allows_js(&self) -> bool {
        self.option_bool("allowJs").unwrap_or(false) || self.option_bool("checkJs").unwrap_or(false)
    }

    pub fn is_incremental(&self) -> bool {
        self.is_composite || self.option_bool("incremental").unwrap_or(false)
    }

    /// Module resolution strategy in effect, applying tsc's defaults when the
    /// option is absent.
    pub fn module_resolution(&self) -> ModuleResolution {
        if let Some(explicit) = self
            .option_str("moduleResolution")
            .and_then(ModuleResolution::parse)
        {
            return explicit;
        }

        let module = self.option_str("module").map(normalize_option);
        let module = module.unwrap_or_else(|| {
            match self.option_str("target").map(normalize_option).as_deref() {
                None | Some("es3") | Some("es5") => "commonjs".to_string(),
                Some(_) => "es2015".to_string(),
            }
        });
        match module.as_str() {
            "node16" => ModuleResolution::Node16,
            "nodenext" => ModuleResolution::NodeNext,
            "preserve" => ModuleResolution::Bundler,
            "amd" | "umd" | "system" | "es6" | "es2015" => ModuleResolution::Classic,
            _ => ModuleResolution::Node10,
        }
    }

    /// `outDir` and `declarationDir`, absolute.
    pub fn output_dirs(&self) -> Vec<PathBuf> {
        ["outDir", "declarationDir"]
            .iter()
            .filter_map(|key| self.option_path(key))
            .collect()
    }
}

/// One file of the chain before merging into its child.
#[derive(Debug, Default)]
struct Layer {
    options: OptionMap,
    option_origins: FxHashMap<String, PathBuf>,
    include: Option<PatternSet>,
    exclude: Option<PatternSet>,
    files: Option<PatternSet>,
    chain: Vec<PathBuf>,
    hasher_input: Vec<(PathBuf, String)>,
}

impl Layer {
    /// Apply `child` on top of `self`.
    fn overlay(&mut self, child: Layer) {
        for (key, value) in child.options {
            let origin = child.option_origins.get(&key).cloned();
            if value.is_null() {
                self.options.shift_remove(&key);
                self.option_origins.remove(&key);
                continue;
            }
            if let Some(origin) = origin {
                self.option_origins.insert(key.clone(), origin);
            }
            self.options.insert(key, value);
        }
        if child.include.is_some() {
            self.include = child.include;
        }
        if child.exclude.is_some() {
            self.exclude = child.exclude;
        }
        if child.files.is_some() {
            self.files = child.files;
        }
        self.chain.extend(child.chain);
        self.hasher_input.extend(child.hasher_input);
    }
}

/// Load `path` and flatten its `extends` chain.
pub fn merge(path: &Path) -> Result<ConfigurationRecord, ConfigError> {
    let source_path = canonicalize_or_owned(path);
    let mut stack = Vec::new();
    let (layer, document) = load_layer(&source_path, &mut stack)?;

    let directory = source_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let references = parse_references(&document, &directory);

    let mut hasher = FxHasher::default();
    for (path, text) in &layer.hasher_input {
        path.hash(&mut hasher);
        text.hash(&mut hasher);
    }

    let mut chain = layer.chain;
    chain.reverse();

    let is_composite = layer
        .options
        .get("composite")
        .and_then(ConfigValue::as_bool)
        .unwrap_or(false);

    Ok(ConfigurationRecord {
        source_path,
        directory,
        options: layer.options,
        option_origins: layer.option_origins,
        include: layer.include,
        exclude: layer.exclude,
        files: layer.files,
        references,
        is_composite,
        content_hash: hasher.finish(),
        extends_chain: chain,
    })
}

fn load_layer(path: &Path, stack: &mut Vec<PathBuf>) -> Result<(Layer, Value), ConfigError> {
    if let Some(position) = stack.iter().position(|entry| entry == path) {
        let mut chain = stack[position..].to_vec();
        chain.push(path.to_path_buf());
        return Err(ConfigError::CircularExtends { chain });
    }

    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let document = parse_tsconfig(path, &text)?;
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    stack.push(path.to_path_buf());
    let mut merged = Layer::default();
    for reference in extends_references(&document) {
        let parent_path = resolve_extends(path, &base_dir, &reference)?;
        let (parent, _) = load_layer(&parent_path, stack)?;
        merged.overlay(parent);
    }
    stack.pop();

    merged.overlay(own_layer(path, &base_dir, &document, text));
    Ok((merged, document))
}

fn own_layer(path: &Path, base_dir: &Path, document: &Value, text: String) -> Layer {
    let mut layer = Layer {
        chain: vec![path.to_path_buf()],
        hasher_input: vec![(path.to_path_buf(), text)],
        ..Layer::default()
    };

    if let Some(Value::Object(options)) = document.get("compilerOptions") {
        for (key, value) in options {
            layer
                .option_origins
                .insert(key.clone(), base_dir.to_path_buf());
            layer.options.insert(key.clone(), ConfigValue::from(value));
        }
    }

    let pattern_set = |key: &str| {
        document.get(key).and_then(Value::as_array).map(|items| PatternSet {
            patterns: items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            base_dir: base_dir.to_path_buf(),
        })
    };
    layer.include = pattern_set("include");
    layer.exclude = pattern_set("exclude");
    layer.files = pattern_set("files");
    layer
}

fn extends_references(document: &Value) -> Vec<String> {
    match document.get("extends") {
        Some(Value::String(reference)) => vec![reference.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Resolve an `extends` entry the way tsc does: relative and absolute
/// references against the declaring file, anything else as a package under
/// an ancestor `node_modules`.
fn resolve_extends(config: &Path, base_dir: &Path, reference: &str) -> Result<PathBuf, ConfigError> {
    let missing = || ConfigError::MissingExtends {
        config: config.to_path_buf(),
        reference: reference.to_string(),
    };
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return Err(missing());
    }

    let is_relative = trimmed.starts_with("./")
        || trimmed.starts_with("../")
        || trimmed.starts_with(".\\")
        || trimmed.starts_with("..\\");
    if is_relative || Path::new(trimmed).is_absolute() {
        let candidate = absolutize(base_dir, trimmed);
        return config_file_candidate(&candidate)
            .map(|path| canonicalize_or_owned(&path))
            .ok_or_else(missing);
    }

    for ancestor in base_dir.ancestors() {
        let package = ancestor.join("node_modules").join(trimmed);
        if let Some(found) = config_file_candidate(&package) {
            return Ok(canonicalize_or_owned(&found));
        }
        let nested = package.join(CONFIG_FILE_NAME);
        if nested.is_file() {
            return Ok(canonicalize_or_owned(&nested));
        }
    }
    Err(missing())
}

fn config_file_candidate(candidate: &Path) -> Option<PathBuf> {
    if candidate.is_file() {
        return Some(candidate.to_path_buf());
    }
    let has_json_extension = candidate
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if !has_json_extension {
        let mut with_extension = candidate.as_os_str().to_os_string();
        with_extension.push(".json");
        let with_extension = PathBuf::from(with_extension);
        if with_extension.is_file() {
            return Some(with_extension);
        }
    }
    None
}

fn parse_references(document: &Value, base_dir: &Path) -> Vec<ProjectReference> {
    let Some(items) = document.get("references").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let raw = item.get("path")?.as_str()?;
            let mut config_path = absolutize(base_dir, raw);
            if config_path.is_dir() || config_path.extension().is_none() {
                config_path = config_path.join(CONFIG_FILE_NAME);
            }
            Some(ProjectReference {
                config_path,
                prepend: item.get("prepend").and_then(Value::as_bool).unwrap_or(false),
            })
        })
        .collect()
}

/// Parse tsconfig JSONC into a JSON document.
///
/// Comments and trailing commas are blanked out in place so that line and
/// column numbers in syntax errors still point into the original text.
pub fn parse_tsconfig(path: &Path, source: &str) -> Result<Value, ConfigError> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let cleaned = blank_trailing_commas(&blank_comments(source));
    if cleaned.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    let document: Value =
        serde_json::from_str(&cleaned).map_err(|err| ConfigError::Syntax {
            path: path.to_path_buf(),
            line: err.line(),
            column: err.column(),
            message: err.to_string(),
        })?;
    if !document.is_object() {
        return Err(ConfigError::Syntax {
            path: path.to_path_buf(),
            line: 1,
            column: 1,
            message: "expected a JSON object at the top level".to_string(),
        });
    }
    Ok(document)
}

fn blank_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape = false;

    while let Some(ch) = chars.next() {
        if in_string {
            out.push(ch);
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match (ch, chars.peek().copied()) {
            ('"', _) => {
                in_string = true;
                out.push(ch);
            }
            ('/', Some('/')) => {
                chars.next();
                out.push_str("  ");
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                    out.push(' ');
                }
            }
            ('/', Some('*')) => {
                chars.next();
                out.push_str("  ");
                while let Some(next) = chars.next() {
                    if next == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        out.push_str("  ");
                        break;
                    }
                    out.push(if next == '\n' { '\n' } else { ' ' });
                }
            }
            _ => out.push(ch),
        }
    }

    out
}

fn blank_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escape = false;

    for (index, &ch) in chars.iter().enumerate() {
        if in_string {
            out.push(ch);
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        if ch == '"' {
            in_string = true;
            out.push(ch);
            continue;
        }
        if ch == ',' {
            let next = chars[index + 1..]
                .iter()
                .copied()
                .find(|c| !c.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                out.push(' ');
                continue;
            }
        }
        out.push(ch);
    }

    out
}
