//! Compiler diagnostics.
//!
//! Both compilers are run with `--pretty false`, which prints one diagnostic
//! per line:
//!
//! ```text
//! src/app.ts(12,5): error TS2322: Type 'string' is not assignable to type 'number'.
//!   The expected type comes from property 'count'.
//! error TS5023: Unknown compiler option 'strictest'.
//! ```
//!
//! Indented lines continue the message of the diagnostic above them.
//! Anything else (banners, stack traces from a crashing compiler) is ignored,
//! so a crash shows up as "non-zero exit with zero diagnostics".

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::fs::absolutize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Suggestion,
    Message,
}

impl DiagnosticSeverity {
    pub fn name(&self) -> &'static str {
        match self {
            DiagnosticSeverity::Error => "error",
            DiagnosticSeverity::Warning => "warning",
            DiagnosticSeverity::Suggestion => "suggestion",
            DiagnosticSeverity::Message => "message",
        }
    }

    pub fn parse(category: &str) -> Option<Self> {
        match category {
            "error" => Some(DiagnosticSeverity::Error),
            "warning" => Some(DiagnosticSeverity::Warning),
            "suggestion" => Some(DiagnosticSeverity::Suggestion),
            "message" => Some(DiagnosticSeverity::Message),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, DiagnosticSeverity::Error)
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, DiagnosticSeverity::Warning)
    }
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One parsed compiler diagnostic. Line and column are 1-based.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Absolute path, or `None` for global diagnostics such as option errors.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub file: Option<PathBuf>,
    pub line: u32,
    pub column: u32,
    pub code: u32,
    pub severity: DiagnosticSeverity,
    pub message: String,
}

impl Diagnostic {
    /// `TS2304` style code.
    pub fn ts_code(&self) -> String {
        format!("TS{}", self.code)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}({},{}): ", file.display(), self.line, self.column)?;
        }
        write!(f, "{} {}: {}", self.severity, self.ts_code(), self.message)
    }
}

/// Parse compiler output. Relative file names are resolved against `cwd`,
/// the directory the compiler ran in.
pub fn parse_diagnostics(output: &str, cwd: &Path) -> Vec<Diagnostic> {
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let mut continuing = false;

    for raw in output.lines() {
        let line = raw.trim_end();
        if line.is_empty() {
            continuing = false;
            continue;
        }

        if continuing && line.starts_with([' ', '\t']) {
            if let Some(last) = diagnostics.last_mut() {
                last.message.push('\n');
                last.message.push_str(line.trim_start());
            }
            continue;
        }

        match parse_line(line, cwd) {
            Some(diagnostic) => {
                diagnostics.push(diagnostic);
                continuing = true;
            }
            None => continuing = false,
        }
    }

    diagnostics
}

fn parse_line(line: &str, cwd: &Path) -> Option<Diagnostic> {
    if let Some((severity, code, message)) = parse_head(line) {
        return Some(Diagnostic {
            file: None,
            line: 0,
            column: 0,
            code,
            severity,
            message,
        });
    }

    // `file(line,col): rest`; the file name itself may contain parentheses,
    // so the location is the last `(` before `): `.
    let location_end = line.find("): ")?;
    let location_start = line[..location_end].rfind('(')?;
    let (line_no, column) = line[location_start + 1..location_end].split_once(',')?;
    let line_no: u32 = line_no.trim().parse().ok()?;
    let column: u32 = column.trim().parse().ok()?;
    let file = &line[..location_start];
    if file.is_empty() {
        return None;
    }
    let (severity, code, message) = parse_head(&line[location_end + 3..])?;

    Some(Diagnostic {
        file: Some(absolutize(cwd, file)),
        line: line_no,
        column,
        code,
        severity,
        message,
    })
}

/// `error TS1234: message`
fn parse_head(text: &str) -> Option<(DiagnosticSeverity, u32, String)> {
    let (category, rest) = text.split_once(' ')?;
    let severity = DiagnosticSeverity::parse(category)?;
    let rest = rest.strip_prefix("TS")?;
    let (code, message) = rest.split_once(':')?;
    let code: u32 = code.parse().ok()?;
    Some((severity, code, message.trim().to_string()))
}

pub fn error_count(diagnostics: &[Diagnostic]) -> usize {
    diagnostics.iter().filter(|d| d.severity.is_error()).count()
}

pub fn warning_count(diagnostics: &[Diagnostic]) -> usize {
    diagnostics.iter().filter(|d| d.severity.is_warning()).count()
}
