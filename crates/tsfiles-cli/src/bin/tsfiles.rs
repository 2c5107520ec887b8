#![allow(clippy::print_stderr)]

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;

use tsfiles_cli::args::CliArgs;

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(2);
        }
    }
}

fn run() -> Result<i32> {
    let args = CliArgs::parse();
    // TSFILES_LOG / RUST_LOG win over --verbose; TSFILES_LOG_FORMAT picks the layout.
    tsfiles::tracing_config::init_tracing(args.verbose);
    if let Err(err) = tsfiles::cleanup::install_termination_handler() {
        tracing::warn!(error = %err, "failed to install termination handler");
    }

    let cwd = std::env::current_dir().context("failed to resolve current directory")?;
    let stdout = std::io::stdout();
    let color = !args.no_color && !args.json && stdout.is_terminal();
    if !color {
        colored::control::set_override(false);
    }

    let mut out = stdout.lock();
    let mut err = std::io::stderr().lock();
    tsfiles_cli::run(&args, &cwd, color, &mut out, &mut err)
}
