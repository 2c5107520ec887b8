//! Compiler selection and fallback tests.
//!
//! Scenarios:
//! - Compatible config with both compilers: fast runs
//! - Fast missing: standard runs with no retry
//! - Incompatible config: standard runs
//! - Automatic fast crash or timeout: exactly one standard retry
//! - Forced variant crash with fallback disabled: terminal failure
//! - Type errors are results, never retried

use super::compiler::{CompilerChoice, CompilerPaths};
use super::error::CheckError;
use super::selector::*;
use super::test_fixtures::{Project, Script, ScriptedRunner};
use std::path::PathBuf;
use std::time::Duration;

const TYPE_ERROR: &str = "src/a.ts(1,7): error TS2322: Type 'string' is not assignable to type 'number'.\n";

fn both() -> CompilerPaths {
    CompilerPaths {
        standard: Some(PathBuf::from("/toolchain/tsc")),
        fast: Some(PathBuf::from("/toolchain/tsgo")),
    }
}

fn standard_only() -> CompilerPaths {
    CompilerPaths {
        standard: Some(PathBuf::from("/toolchain/tsc")),
        fast: None,
    }
}

fn selector<'a>(
    paths: &'a CompilerPaths,
    runner: &'a ScriptedRunner,
    preference: CompilerOverride,
    fallback: bool,
) -> CompilerSelector<'a> {
    CompilerSelector {
        paths,
        runner,
        preference,
        fallback,
        timeout: Duration::from_secs(5),
    }
}

fn modern_project() -> Project {
    let project = Project::new();
    project.write(
        "tsconfig.json",
        r#"{ "compilerOptions": { "module": "esnext", "moduleResolution": "bundler", "target": "es2022" } }"#,
    );
    project
}

#[test]
fn test_compatibility_rules() {
    let project = Project::new();
    let cases = [
        (r#"{ "moduleResolution": "classic" }"#, Incompatibility::ClassicResolution),
        (
            r#"{ "moduleResolution": "node", "paths": { "@/*": ["src/*"] } }"#,
            Incompatibility::LegacyResolutionWithPaths,
        ),
        (r#"{ "baseUrl": "." }"#, Incompatibility::BaseUrlOutsideBundler),
        (r#"{ "outFile": "bundle.js", "module": "esnext" }"#, Incompatibility::OutFile),
        (r#"{ "module": "AMD" }"#, Incompatibility::LegacyModule("amd".to_string())),
        (r#"{ "target": "ES5" }"#, Incompatibility::LegacyTarget("es5".to_string())),
    ];
    for (options, expected) in cases {
        project.write(
            "tsconfig.json",
            &format!(r#"{{ "compilerOptions": {options} }}"#),
        );
        let found = analyze_compatibility(&project.record("tsconfig.json"));
        assert!(found.contains(&expected), "{options}: expected {expected:?}, got {found:?}");
    }
}

#[test]
fn test_node10_without_paths_and_bundler_base_url_are_compatible() {
    let project = Project::new();
    project.write(
        "tsconfig.json",
        r#"{ "compilerOptions": { "moduleResolution": "node10", "paths": {} } }"#,
    );
    assert!(analyze_compatibility(&project.record("tsconfig.json")).is_empty());

    project.write(
        "tsconfig.json",
        r#"{ "compilerOptions": { "moduleResolution": "bundler", "module": "esnext", "baseUrl": "." } }"#,
    );
    assert!(analyze_compatibility(&project.record("tsconfig.json")).is_empty());
}

#[test]
fn test_auto_prefers_fast_when_compatible() {
    let project = modern_project();
    let paths = both();
    let runner = ScriptedRunner::new();

    let outcome = selector(&paths, &runner, CompilerOverride::Auto, true)
        .execute(&project.record("tsconfig.json"), &project.path("synth.json"));
    let run = outcome.result.expect("clean run");
    assert_eq!(run.choice, CompilerChoice::Fast);
    assert_eq!(
        outcome.transitions,
        vec![
            ExecutionState::Unselected,
            ExecutionState::Evaluating,
            ExecutionState::Selected(CompilerChoice::Fast),
            ExecutionState::Executing(CompilerChoice::Fast),
            ExecutionState::Succeeded,
        ]
    );
    assert_eq!(runner.programs_called(), vec!["tsgo"]);
}

#[test]
fn test_unavailable_fast_selects_standard_without_retry() {
    let project = modern_project();
    let paths = standard_only();
    let runner = ScriptedRunner::new();

    let outcome = selector(&paths, &runner, CompilerOverride::Auto, true)
        .execute(&project.record("tsconfig.json"), &project.path("synth.json"));
    assert_eq!(outcome.result.expect("clean run").choice, CompilerChoice::Standard);
    assert!(!outcome.retried);
    assert!(!outcome.transitions.contains(&ExecutionState::FailedRetrying));
    assert_eq!(runner.programs_called(), vec!["tsc"]);
}

#[test]
fn test_incompatible_config_selects_standard() {
    let project = Project::new();
    project.write("tsconfig.json", r#"{ "compilerOptions": { "outFile": "out.js" } }"#);
    let paths = both();
    let runner = ScriptedRunner::new();

    let selection = selector(&paths, &runner, CompilerOverride::Auto, true)
        .select(&project.record("tsconfig.json"))
        .expect("selection");
    assert_eq!(selection.choice, CompilerChoice::Standard);
    assert!(selection.automatic);
    assert_eq!(selection.incompatibilities, vec![Incompatibility::OutFile]);
}

#[test]
fn test_fast_crash_retries_once_with_standard() {
    let project = modern_project();
    let paths = both();
    let runner = ScriptedRunner::new()
        .with("tsgo", Script::crash())
        .with("tsc", Script::type_errors(TYPE_ERROR));

    let outcome = selector(&paths, &runner, CompilerOverride::Auto, true)
        .execute(&project.record("tsconfig.json"), &project.path("synth.json"));
    assert!(outcome.retried);
    let run = outcome.result.expect("standard run");
    assert_eq!(run.choice, CompilerChoice::Standard);
    assert_eq!(run.diagnostics.len(), 1);
    assert_eq!(
        &outcome.transitions[4..],
        &[
            ExecutionState::FailedRetrying,
            ExecutionState::Executing(CompilerChoice::Standard),
            ExecutionState::Succeeded,
        ]
    );
    assert_eq!(runner.programs_called(), vec!["tsgo", "tsc"]);
}

#[test]
fn test_fast_timeout_counts_as_tooling_failure() {
    let project = modern_project();
    let paths = both();
    let runner = ScriptedRunner::new().with("tsgo", Script::Timeout);

    let outcome = selector(&paths, &runner, CompilerOverride::Auto, true)
        .execute(&project.record("tsconfig.json"), &project.path("synth.json"));
    assert!(outcome.retried);
    assert_eq!(outcome.result.expect("standard run").choice, CompilerChoice::Standard);
}

#[test]
fn test_retry_failure_is_terminal() {
    let project = modern_project();
    let paths = both();
    let runner = ScriptedRunner::new()
        .with("tsgo", Script::crash())
        .with("tsc", Script::SpawnFailure);

    let outcome = selector(&paths, &runner, CompilerOverride::Auto, true)
        .execute(&project.record("tsconfig.json"), &project.path("synth.json"));
    assert_eq!(outcome.final_state(), ExecutionState::FailedTerminal);
    assert!(matches!(outcome.result, Err(CheckError::Exec(_))));
    assert_eq!(runner.calls().len(), 2);
}

#[test]
fn test_fallback_disabled_does_not_retry() {
    let project = modern_project();
    let paths = both();
    let runner = ScriptedRunner::new().with("tsgo", Script::crash());

    let outcome = selector(&paths, &runner, CompilerOverride::Auto, false)
        .execute(&project.record("tsconfig.json"), &project.path("synth.json"));
    assert!(!outcome.retried);
    assert_eq!(outcome.final_state(), ExecutionState::FailedTerminal);
    assert_eq!(runner.programs_called(), vec!["tsgo"]);
}

#[test]
fn test_forced_crash_without_fallback_is_terminal_with_output() {
    let project = modern_project();
    let paths = both();
    let runner = ScriptedRunner::new().with("tsgo", Script::crash());

    let outcome = selector(&paths, &runner, CompilerOverride::Fast, false)
        .execute(&project.record("tsconfig.json"), &project.path("synth.json"));
    assert_eq!(outcome.final_state(), ExecutionState::FailedTerminal);
    assert!(!outcome.retried);
    match outcome.result {
        Err(CheckError::CompilerCrashed { choice, status, output }) => {
            assert_eq!(choice, CompilerChoice::Fast);
            assert_eq!(status, "134");
            assert!(output.contains("panic: runtime error"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_forced_fast_is_not_retried_even_with_fallback() {
    let project = modern_project();
    let paths = both();
    let runner = ScriptedRunner::new().with("tsgo", Script::crash());

    let outcome = selector(&paths, &runner, CompilerOverride::Fast, true)
        .execute(&project.record("tsconfig.json"), &project.path("synth.json"));
    assert!(!outcome.retried);
    assert_eq!(runner.calls().len(), 1);
}

#[test]
fn test_forced_variant_ignores_incompatibility() {
    let project = Project::new();
    project.write("tsconfig.json", r#"{ "compilerOptions": { "target": "es5" } }"#);
    let paths = both();
    let runner = ScriptedRunner::new();

    let selection = selector(&paths, &runner, CompilerOverride::Fast, true)
        .select(&project.record("tsconfig.json"))
        .expect("forced selection");
    assert_eq!(selection.choice, CompilerChoice::Fast);
    assert!(!selection.automatic);
}

#[test]
fn test_forced_unavailable_compiler_is_an_error() {
    let project = modern_project();
    let paths = standard_only();
    let runner = ScriptedRunner::new();

    let outcome = selector(&paths, &runner, CompilerOverride::Fast, true)
        .execute(&project.record("tsconfig.json"), &project.path("synth.json"));
    assert!(matches!(
        outcome.result,
        Err(CheckError::CompilerUnavailable {
            choice: CompilerChoice::Fast
        })
    ));
    assert!(runner.calls().is_empty());
}

#[test]
fn test_type_errors_are_not_retried() {
    let project = modern_project();
    let paths = both();
    let runner = ScriptedRunner::new().with("tsgo", Script::type_errors(TYPE_ERROR));

    let outcome = selector(&paths, &runner, CompilerOverride::Auto, true)
        .execute(&project.record("tsconfig.json"), &project.path("synth.json"));
    assert!(!outcome.retried);
    let run = outcome.result.expect("type errors are a result");
    assert_eq!(run.choice, CompilerChoice::Fast);
    assert_eq!(run.diagnostics[0].code, 2322);
}

#[test]
fn test_compiler_runs_in_project_directory() {
    let project = modern_project();
    let paths = both();
    let runner = ScriptedRunner::new();
    let synthesized = project.path("tsconfig.tsfiles-x.json");

    let outcome = selector(&paths, &runner, CompilerOverride::Auto, true)
        .execute(&project.record("tsconfig.json"), &synthesized);
    assert!(outcome.result.is_ok());
    let calls = runner.calls();
    assert_eq!(calls[0].cwd, project.root());
    assert!(calls[0].args.iter().any(|arg| arg.as_os_str() == synthesized.as_os_str()));
}
