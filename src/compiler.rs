//! Compiler subprocess execution.
//!
//! Both compiler variants are external programs. They are launched through
//! the [`CompilerRunner`] seam so tests can script their behavior; the real
//! [`ProcessRunner`] enforces a hard timeout and kills the child on expiry.

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::ExecError;

/// Poll interval while waiting for a compiler to exit.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Minimum time spent reading leftover output once the child is gone.
const DRAIN_GRACE: Duration = Duration::from_millis(100);

/// The two interchangeable compilers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompilerChoice {
    /// The reference `tsc` compiler.
    Standard,
    /// The native `tsgo` preview compiler.
    Fast,
}

impl CompilerChoice {
    pub fn binary_name(self) -> &'static str {
        match self {
            CompilerChoice::Standard => "tsc",
            CompilerChoice::Fast => "tsgo",
        }
    }
}

impl fmt::Display for CompilerChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// One compiler command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: PathBuf,
    pub timeout: Duration,
}

impl Invocation {
    /// Type-check `config` with machine-readable output.
    pub fn check(program: &Path, config: &Path, cwd: &Path, timeout: Duration) -> Self {
        Invocation {
            program: program.to_path_buf(),
            args: vec![
                "--project".into(),
                config.as_os_str().to_os_string(),
                "--pretty".into(),
                "false".into(),
            ],
            cwd: cwd.to_path_buf(),
            timeout,
        }
    }
}

/// Captured result of a finished compiler process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ExecutionOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn status_label(&self) -> String {
        match self.status {
            Some(code) => code.to_string(),
            None => "signal".to_string(),
        }
    }

    /// stdout followed by stderr, for error reports.
    pub fn combined(&self) -> String {
        match (self.stdout.trim(), self.stderr.trim()) {
            ("", stderr) => stderr.to_string(),
            (stdout, "") => stdout.to_string(),
            (stdout, stderr) => format!("{stdout}\n{stderr}"),
        }
    }
}

pub trait CompilerRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> Result<ExecutionOutput, ExecError>;
}

/// Runs compilers as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CompilerRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<ExecutionOutput, ExecError> {
        let start = Instant::now();
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExecError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;
        tracing::debug!(
            program = %invocation.program.display(),
            pid = child.id(),
            "compiler started"
        );

        // Pipes are drained on their own threads so a chatty compiler cannot
        // block on a full pipe while we poll for exit.
        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    // A background grandchild can inherit the pipes and keep
                    // them open past our child's exit; reading stops at the
                    // invocation deadline either way.
                    let deadline = start + invocation.timeout.max(start.elapsed() + DRAIN_GRACE);
                    let output = ExecutionOutput {
                        status: status.code(),
                        stdout: drain(&stdout, deadline),
                        stderr: drain(&stderr, deadline),
                        duration: start.elapsed(),
                    };
                    tracing::debug!(
                        program = %invocation.program.display(),
                        status = %output.status_label(),
                        elapsed_ms = output.duration.as_millis() as u64,
                        "compiler exited"
                    );
                    return Ok(output);
                }
                Ok(None) if start.elapsed() >= invocation.timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    let deadline = Instant::now() + DRAIN_GRACE;
                    drain(&stdout, deadline);
                    drain(&stderr, deadline);
                    tracing::warn!(
                        program = %invocation.program.display(),
                        timeout_s = invocation.timeout.as_secs(),
                        "compiler timed out and was killed"
                    );
                    return Err(ExecError::Timeout {
                        program: invocation.program.clone(),
                        timeout: invocation.timeout,
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(source) => {
                    let _ = child.kill();
                    return Err(ExecError::Io {
                        program: invocation.program.clone(),
                        source,
                    });
                }
            }
        }
    }
}

/// Forward a pipe in chunks until EOF.
fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    if let Some(mut pipe) = pipe {
        thread::spawn(move || {
            let mut buf = [0u8; 8192];
            loop {
                match pipe.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }
    rx
}

/// Everything received before the pipe closed or `deadline` passed.
fn drain(rx: &mpsc::Receiver<Vec<u8>>, deadline: Instant) -> String {
    let mut bytes = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(chunk) => bytes.extend_from_slice(&chunk),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::debug!("compiler output still open at deadline, keeping what was read");
                break;
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Find the binary for `choice`.
///
/// Search order: the explicit path, the nearest `node_modules/.bin` above
/// `project_dir`, then `PATH`.
pub fn locate_compiler(
    choice: CompilerChoice,
    explicit: Option<&Path>,
    project_dir: &Path,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        tracing::warn!(
            compiler = %choice,
            path = %path.display(),
            "configured compiler path does not exist"
        );
        return None;
    }

    for dir in project_dir.ancestors() {
        let bin_dir = dir.join("node_modules").join(".bin");
        if let Some(found) = local_binary(&bin_dir, choice.binary_name()) {
            tracing::debug!(compiler = %choice, path = %found.display(), "found local compiler");
            return Some(found);
        }
    }

    match which::which(choice.binary_name()) {
        Ok(path) => {
            tracing::debug!(compiler = %choice, path = %path.display(), "found compiler in PATH");
            Some(path)
        }
        Err(_) => None,
    }
}

fn local_binary(bin_dir: &Path, name: &str) -> Option<PathBuf> {
    #[cfg(windows)]
    let names = [format!("{name}.cmd"), format!("{name}.exe")];
    #[cfg(not(windows))]
    let names = [name.to_string()];

    names
        .into_iter()
        .map(|name| bin_dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Binaries located once per run, shared by all groups of one project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerPaths {
    pub standard: Option<PathBuf>,
    pub fast: Option<PathBuf>,
}

impl CompilerPaths {
    pub fn locate(
        standard: Option<&Path>,
        fast: Option<&Path>,
        project_dir: &Path,
    ) -> Self {
        CompilerPaths {
            standard: locate_compiler(CompilerChoice::Standard, standard, project_dir),
            fast: locate_compiler(CompilerChoice::Fast, fast, project_dir),
        }
    }

    pub fn get(&self, choice: CompilerChoice) -> Option<&Path> {
        match choice {
            CompilerChoice::Standard => self.standard.as_deref(),
            CompilerChoice::Fast => self.fast.as_deref(),
        }
    }
}
