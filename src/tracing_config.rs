//! Tracing setup.
//!
//! Three output formats, selected by `TSFILES_LOG_FORMAT`:
//!
//! - `text` (default): flat `tracing-subscriber` lines
//! - `tree`: indented spans via `tracing-tree`
//! - `json`: one JSON object per event
//!
//! ```bash
//! TSFILES_LOG=debug tsfiles src/a.ts
//! TSFILES_LOG="tsfiles::discovery=trace" TSFILES_LOG_FORMAT=tree tsfiles src/a.ts
//! ```
//!
//! Without `TSFILES_LOG`, `RUST_LOG` or `--verbose` no subscriber is
//! installed. Output always goes to stderr so stdout stays clean for
//! diagnostics and `--json`.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

pub const LOG_ENV: &str = "TSFILES_LOG";
pub const LOG_FORMAT_ENV: &str = "TSFILES_LOG_FORMAT";

/// Filter applied by `--verbose` when no log variable is set.
const VERBOSE_FILTER: &str = "tsfiles=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Tree,
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "tree" => Self::Tree,
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    fn from_env() -> Self {
        Self::parse(&std::env::var(LOG_FORMAT_ENV).unwrap_or_default())
    }
}

/// `TSFILES_LOG` wins over `RUST_LOG`; `--verbose` alone means
/// [`VERBOSE_FILTER`].
fn build_filter(verbose: bool) -> Option<EnvFilter> {
    if let Ok(value) = std::env::var(LOG_ENV) {
        return Some(EnvFilter::builder().parse_lossy(value));
    }
    if std::env::var("RUST_LOG").is_ok() {
        return Some(EnvFilter::from_default_env());
    }
    verbose.then(|| EnvFilter::new(VERBOSE_FILTER))
}

/// Install the global subscriber. Calling it twice is harmless; the second
/// call leaves the first subscriber in place.
pub fn init_tracing(verbose: bool) {
    let Some(filter) = build_filter(verbose) else {
        return;
    };

    match LogFormat::from_env() {
        LogFormat::Tree => {
            let tree_layer = tracing_tree::HierarchicalLayer::default()
                .with_indent_amount(2)
                .with_indent_lines(true)
                .with_targets(true);
            let _ = Registry::default().with(filter).with(tree_layer).try_init();
        }
        LogFormat::Json => {
            let json_layer = fmt::layer().json().with_writer(std::io::stderr);
            let _ = Registry::default().with(filter).with(json_layer).try_init();
        }
        LogFormat::Text => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}
