//! Command-line front end: argument parsing and output modes.

pub mod args;

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use args::CliArgs;
use tsfiles::driver::{CheckReport, Checker, GroupView};
use tsfiles::reporter::Reporter;

/// Exit status when a planning mode hits a configuration or system failure.
const EXIT_FAILURE: i32 = 2;

/// Run the mode selected by `args`. Results go to `out`, per-group failures
/// of the planning modes to `err`. Returns the process exit code.
pub fn run(
    args: &CliArgs,
    cwd: &Path,
    color: bool,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<i32> {
    let checker = Checker::new(args.check_options());

    if args.show_config {
        let views = checker.show_config(cwd, &args.files);
        return write_views(&views, out, err, |config| {
            serde_json::to_string_pretty(config).context("failed to serialize configuration")
        });
    }

    if args.list_files {
        let views = checker.list_files(cwd, &args.files);
        return write_views(&views, out, err, |closure| {
            Ok(closure
                .source_files
                .iter()
                .map(|file| file.display().to_string())
                .collect::<Vec<_>>()
                .join("\n"))
        });
    }

    let report = checker.check_files(cwd, &args.files);
    write_report(&report, args.json, color, cwd, out)?;
    Ok(report.exit_code())
}

pub fn write_report(
    report: &CheckReport,
    json: bool,
    color: bool,
    cwd: &Path,
    out: &mut dyn Write,
) -> Result<()> {
    if json {
        let text = serde_json::to_string_pretty(report).context("failed to serialize report")?;
        writeln!(out, "{text}").context("failed to write report")?;
    } else {
        let mut reporter = Reporter::new(color, cwd);
        writeln!(out, "{}", reporter.render(report)).context("failed to write report")?;
    }
    Ok(())
}

/// One block per group, headed by its configuration path. Failed groups are
/// reported on `err` and make the exit code non-zero.
fn write_views<T>(
    views: &[GroupView<T>],
    out: &mut dyn Write,
    err: &mut dyn Write,
    format: impl Fn(&T) -> Result<String>,
) -> Result<i32> {
    let mut code = 0;
    for view in views {
        let heading = match &view.config_path {
            Some(config) => config.display().to_string(),
            None => "<no tsconfig>".to_string(),
        };
        match &view.result {
            Ok(value) => {
                writeln!(out, "// {heading}").context("failed to write output")?;
                writeln!(out, "{}", format(value)?).context("failed to write output")?;
            }
            Err(error) => {
                tracing::debug!(config = %heading, error = %error, "file group failed");
                writeln!(err, "error ({heading}): {error}").context("failed to write output")?;
                code = EXIT_FAILURE;
            }
        }
    }
    Ok(code)
}
