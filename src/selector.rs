//! Compiler variant selection and the single-retry fallback.
//!
//! ```text
//! Unselected -> Evaluating -> Selected(choice) -> Executing(choice)
//!     -> Succeeded
//!     -> FailedTerminal
//!     -> FailedRetrying -> Executing(Standard) -> Succeeded | FailedTerminal
//! ```
//!
//! The fast compiler is picked automatically only when it is installed and
//! the configuration uses nothing it is known to handle differently. If an
//! automatically picked fast run fails as a tool (crash, timeout, no
//! diagnostics), the standard compiler gets exactly one retry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::compiler::{
    CompilerChoice, CompilerPaths, CompilerRunner, ExecutionOutput, Invocation,
};
use crate::config::{ConfigurationRecord, ModuleResolution};
use crate::config_value::normalize_option;
use crate::diagnostics::{Diagnostic, parse_diagnostics};
use crate::error::{CheckError, CheckResult};

/// Caller preference for the compiler variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompilerOverride {
    #[default]
    Auto,
    Standard,
    Fast,
}

impl CompilerOverride {
    fn forced(self) -> Option<CompilerChoice> {
        match self {
            CompilerOverride::Auto => None,
            CompilerOverride::Standard => Some(CompilerChoice::Standard),
            CompilerOverride::Fast => Some(CompilerChoice::Fast),
        }
    }
}

/// A configuration feature the fast compiler does not support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incompatibility {
    ClassicResolution,
    LegacyResolutionWithPaths,
    BaseUrlOutsideBundler,
    OutFile,
    LegacyModule(String),
    LegacyTarget(String),
}

impl fmt::Display for Incompatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Incompatibility::ClassicResolution => f.write_str("moduleResolution is classic"),
            Incompatibility::LegacyResolutionWithPaths => {
                f.write_str("paths mapping under node10 module resolution")
            }
            Incompatibility::BaseUrlOutsideBundler => {
                f.write_str("baseUrl without bundler module resolution")
            }
            Incompatibility::OutFile => f.write_str("outFile is set"),
            Incompatibility::LegacyModule(module) => write!(f, "module is {module}"),
            Incompatibility::LegacyTarget(target) => write!(f, "target is {target}"),
        }
    }
}

/// Static check of `record` against what the fast compiler supports. An
/// empty result means compatible.
pub fn analyze_compatibility(record: &ConfigurationRecord) -> Vec<Incompatibility> {
    let mut found = Vec::new();
    let resolution = record.option_str("moduleResolution").map(normalize_option);

    match resolution.as_deref() {
        Some("classic") => found.push(Incompatibility::ClassicResolution),
        Some("node") | Some("node10") => {
            let has_paths = record
                .option("paths")
                .and_then(|paths| paths.as_object())
                .is_some_and(|table| !table.is_empty());
            if has_paths {
                found.push(Incompatibility::LegacyResolutionWithPaths);
            }
        }
        _ => {}
    }

    if record.option_str("baseUrl").is_some()
        && record.module_resolution() != ModuleResolution::Bundler
    {
        found.push(Incompatibility::BaseUrlOutsideBundler);
    }

    if record.option_str("outFile").is_some() {
        found.push(Incompatibility::OutFile);
    }

    if let Some(module) = record.option_str("module").map(normalize_option)
        && matches!(module.as_str(), "amd" | "umd" | "system" | "none")
    {
        found.push(Incompatibility::LegacyModule(module));
    }

    if let Some(target) = record.option_str("target").map(normalize_option)
        && matches!(target.as_str(), "es3" | "es5")
    {
        found.push(Incompatibility::LegacyTarget(target));
    }

    found
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "compiler", rename_all = "snake_case")]
pub enum ExecutionState {
    Unselected,
    Evaluating,
    Selected(CompilerChoice),
    Executing(CompilerChoice),
    Succeeded,
    FailedRetrying,
    FailedTerminal,
}

/// Outcome of selection: which compiler, and whether the caller forced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub choice: CompilerChoice,
    pub automatic: bool,
    pub incompatibilities: Vec<Incompatibility>,
}

/// A compiler run that produced a usable result, clean or with type errors.
#[derive(Debug, Clone)]
pub struct CompilerRun {
    pub choice: CompilerChoice,
    pub output: ExecutionOutput,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug)]
pub struct ExecutionOutcome {
    pub result: CheckResult<CompilerRun>,
    /// Every state visited, in order.
    pub transitions: Vec<ExecutionState>,
    pub retried: bool,
}

impl ExecutionOutcome {
    pub fn final_state(&self) -> ExecutionState {
        self.transitions
            .last()
            .copied()
            .unwrap_or(ExecutionState::Unselected)
    }
}

pub struct CompilerSelector<'a> {
    pub paths: &'a CompilerPaths,
    pub runner: &'a dyn CompilerRunner,
    pub preference: CompilerOverride,
    pub fallback: bool,
    pub timeout: Duration,
}

impl CompilerSelector<'_> {
    pub fn select(&self, record: &ConfigurationRecord) -> CheckResult<Selection> {
        if let Some(choice) = self.preference.forced() {
            if self.paths.get(choice).is_none() {
                return Err(CheckError::CompilerUnavailable { choice });
            }
            return Ok(Selection {
                choice,
                automatic: false,
                incompatibilities: Vec::new(),
            });
        }

        let incompatibilities = analyze_compatibility(record);
        let fast_usable = self.paths.fast.is_some() && incompatibilities.is_empty();
        if fast_usable {
            return Ok(Selection {
                choice: CompilerChoice::Fast,
                automatic: true,
                incompatibilities,
            });
        }

        if self.paths.fast.is_some() {
            tracing::debug!(
                config = %record.source_path.display(),
                reasons = %join_reasons(&incompatibilities),
                "fast compiler skipped for incompatible configuration"
            );
        }
        if self.paths.standard.is_none() {
            return Err(CheckError::CompilerUnavailable {
                choice: CompilerChoice::Standard,
            });
        }
        Ok(Selection {
            choice: CompilerChoice::Standard,
            automatic: true,
            incompatibilities,
        })
    }

    /// Select a compiler and run it against the synthesized `config`.
    pub fn execute(&self, record: &ConfigurationRecord, config: &Path) -> ExecutionOutcome {
        let mut transitions = vec![ExecutionState::Unselected, ExecutionState::Evaluating];

        let selection = match self.select(record) {
            Ok(selection) => selection,
            Err(err) => {
                transitions.push(ExecutionState::FailedTerminal);
                return ExecutionOutcome {
                    result: Err(err),
                    transitions,
                    retried: false,
                };
            }
        };
        transitions.push(ExecutionState::Selected(selection.choice));
        transitions.push(ExecutionState::Executing(selection.choice));

        let first = self.attempt(selection.choice, record, config);
        let first_err = match first {
            Ok(run) => {
                transitions.push(ExecutionState::Succeeded);
                return ExecutionOutcome {
                    result: Ok(run),
                    transitions,
                    retried: false,
                };
            }
            Err(err) => err,
        };

        let may_retry = selection.automatic
            && selection.choice == CompilerChoice::Fast
            && self.fallback
            && self.paths.standard.is_some();
        if !may_retry {
            transitions.push(ExecutionState::FailedTerminal);
            return ExecutionOutcome {
                result: Err(first_err),
                transitions,
                retried: false,
            };
        }

        tracing::warn!(
            config = %record.source_path.display(),
            error = %first_err,
            "fast compiler failed, retrying with standard compiler"
        );
        transitions.push(ExecutionState::FailedRetrying);
        transitions.push(ExecutionState::Executing(CompilerChoice::Standard));

        let result = self.attempt(CompilerChoice::Standard, record, config);
        transitions.push(if result.is_ok() {
            ExecutionState::Succeeded
        } else {
            ExecutionState::FailedTerminal
        });
        ExecutionOutcome {
            result,
            transitions,
            retried: true,
        }
    }

    /// One run. Tooling failures come back as errors; type errors do not.
    fn attempt(
        &self,
        choice: CompilerChoice,
        record: &ConfigurationRecord,
        config: &Path,
    ) -> CheckResult<CompilerRun> {
        let program = self
            .paths
            .get(choice)
            .ok_or(CheckError::CompilerUnavailable { choice })?;
        let invocation = Invocation::check(program, config, &record.directory, self.timeout);
        tracing::debug!(compiler = %choice, config = %config.display(), "running compiler");

        let output = self.runner.run(&invocation)?;
        let mut diagnostics = parse_diagnostics(&output.stdout, &record.directory);
        diagnostics.extend(parse_diagnostics(&output.stderr, &record.directory));

        if !output.success() && diagnostics.is_empty() {
            return Err(CheckError::CompilerCrashed {
                choice,
                status: output.status_label(),
                output: output.combined(),
            });
        }
        Ok(CompilerRun {
            choice,
            output,
            diagnostics,
        })
    }
}

fn join_reasons(incompatibilities: &[Incompatibility]) -> String {
    incompatibilities
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
