use colored::Colorize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::diagnostics::{Diagnostic, DiagnosticSeverity};
use crate::driver::{CheckReport, FailureKind, GroupReport};

/// Terminal rendering of a check report.
pub struct Reporter {
    color: bool,
    /// Paths are shown relative to this directory when possible.
    cwd: PathBuf,
    sources: HashMap<PathBuf, Option<String>>,
}

impl Reporter {
    pub fn new(color: bool, cwd: &Path) -> Self {
        Reporter {
            color,
            cwd: cwd.to_path_buf(),
            sources: HashMap::new(),
        }
    }

    pub fn render(&mut self, report: &CheckReport) -> String {
        let mut out = String::new();
        for (index, diagnostic) in report.diagnostics.iter().enumerate() {
            if index > 0 {
                out.push('\n');
            }
            out.push_str(&self.format_diagnostic(diagnostic));
            out.push('\n');
        }

        for group in &report.groups {
            if let Some(line) = self.format_failure(group) {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(&line);
                out.push('\n');
            }
        }

        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&self.format_summary(report));
        out
    }

    pub fn format_diagnostic(&mut self, diagnostic: &Diagnostic) -> String {
        let mut output = String::new();
        match &diagnostic.file {
            Some(file) => {
                let location = format!(
                    "{}:{}:{}",
                    self.display_path(file),
                    diagnostic.line,
                    diagnostic.column
                );
                output.push_str(&if self.color {
                    location.cyan().to_string()
                } else {
                    location
                });
            }
            None => output.push_str("<global>"),
        }

        output.push_str(" - ");
        output.push_str(&self.format_severity(diagnostic.severity));
        output.push(' ');
        output.push_str(&self.format_code(diagnostic.code));
        output.push_str(": ");
        output.push_str(&diagnostic.message);

        if let Some(file) = &diagnostic.file
            && let Some(snippet) = self.format_snippet(file, diagnostic.line, diagnostic.column)
        {
            output.push_str(&snippet);
        }
        output
    }

    /// Source line with a marker under the reported column.
    fn format_snippet(&mut self, file: &Path, line: u32, column: u32) -> Option<String> {
        if line == 0 {
            return None;
        }
        let source = self
            .sources
            .entry(file.to_path_buf())
            .or_insert_with(|| std::fs::read_to_string(file).ok())
            .as_deref()?;
        let line_text = source.lines().nth((line - 1) as usize)?;

        let mut underline = String::new();
        for (index, ch) in line_text.chars().enumerate() {
            if index + 1 >= column as usize {
                break;
            }
            underline.push(if ch == '\t' { '\t' } else { ' ' });
        }
        let marker = if self.color {
            "~".red().to_string()
        } else {
            "~".to_string()
        };

        Some(format!("\n\n  {line:>4}  {line_text}\n        {underline}{marker}"))
    }

    fn format_failure(&self, group: &GroupReport) -> Option<String> {
        let failure = group.failure.as_ref()?;
        let label = match failure.kind {
            FailureKind::Config => "config error",
            FailureKind::System => "system error",
        };
        let label = if self.color {
            label.red().bold().to_string()
        } else {
            label.to_string()
        };
        let scope = match &group.config_path {
            Some(config) => self.display_path(config),
            None => group
                .root_files
                .iter()
                .map(|file| self.display_path(file))
                .collect::<Vec<_>>()
                .join(", "),
        };
        Some(format!("{label} ({scope}): {}", failure.message))
    }

    pub fn format_summary(&self, report: &CheckReport) -> String {
        let failed_groups = report
            .groups
            .iter()
            .filter(|group| group.failure.is_some())
            .count();
        let files = report.files_checked.len();
        let seconds = report.duration.as_secs_f64();

        if report.success {
            let line = format!(
                "No errors in {files} file{} ({seconds:.2}s)",
                plural(files)
            );
            return if self.color {
                line.green().to_string()
            } else {
                line
            };
        }

        let mut parts = Vec::new();
        if report.error_count > 0 {
            parts.push(format!(
                "{} error{}",
                report.error_count,
                plural(report.error_count)
            ));
        }
        if report.warning_count > 0 {
            parts.push(format!(
                "{} warning{}",
                report.warning_count,
                plural(report.warning_count)
            ));
        }
        if failed_groups > 0 {
            parts.push(format!(
                "{failed_groups} failed group{}",
                plural(failed_groups)
            ));
        }
        let line = format!(
            "Found {} in {files} file{} ({seconds:.2}s)",
            parts.join(", "),
            plural(files)
        );
        if self.color {
            line.red().bold().to_string()
        } else {
            line
        }
    }

    fn format_severity(&self, severity: DiagnosticSeverity) -> String {
        let label = severity.name();
        if !self.color {
            return label.to_string();
        }
        match severity {
            DiagnosticSeverity::Error => label.red().bold().to_string(),
            DiagnosticSeverity::Warning => label.yellow().bold().to_string(),
            DiagnosticSeverity::Suggestion => label.blue().bold().to_string(),
            DiagnosticSeverity::Message => label.cyan().bold().to_string(),
        }
    }

    fn format_code(&self, code: u32) -> String {
        let label = format!("TS{code}");
        if self.color {
            label.bright_blue().to_string()
        } else {
            label
        }
    }

    fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.cwd)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}
