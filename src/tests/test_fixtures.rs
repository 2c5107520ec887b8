//! Shared fixtures for unit tests: throwaway project trees and a scripted
//! compiler runner.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::compiler::{CompilerRunner, ExecutionOutput, Invocation};
use crate::config::{self, ConfigurationRecord};
use crate::error::ExecError;

/// A project tree in a temp directory. Paths handed out are canonical so they
/// compare equal to what the pipeline produces.
pub struct Project {
    _dir: tempfile::TempDir,
    root: PathBuf,
}

impl Project {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = std::fs::canonicalize(dir.path()).expect("canonical temp dir");
        Project { _dir: dir, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(&path, contents).expect("write fixture file");
        std::fs::canonicalize(&path).expect("canonical fixture path")
    }

    pub fn mkdir(&self, relative: &str) -> PathBuf {
        let path = self.path(relative);
        std::fs::create_dir_all(&path).expect("create dir");
        path
    }

    pub fn record(&self, relative: &str) -> ConfigurationRecord {
        config::merge(&self.path(relative)).expect("config merges")
    }
}

pub fn roots(paths: &[PathBuf]) -> BTreeSet<PathBuf> {
    paths.iter().cloned().collect()
}

/// What a scripted compiler does when invoked.
#[derive(Debug, Clone)]
pub enum Script {
    Exit { status: i32, stdout: String },
    Timeout,
    SpawnFailure,
}

impl Script {
    pub fn clean() -> Self {
        Script::Exit {
            status: 0,
            stdout: String::new(),
        }
    }

    pub fn type_errors(stdout: &str) -> Self {
        Script::Exit {
            status: 2,
            stdout: stdout.to_string(),
        }
    }

    pub fn crash() -> Self {
        Script::Exit {
            status: 134,
            stdout: "panic: runtime error: index out of range\ngoroutine 1 [running]:".to_string(),
        }
    }
}

/// Compiler runner keyed by program file name (`tsc`, `tsgo`).
#[derive(Default)]
pub struct ScriptedRunner {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, program: &str, script: Script) -> Self {
        self.scripts.insert(program.to_string(), script);
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn programs_called(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|call| program_name(&call.program))
            .collect()
    }
}

fn program_name(program: &Path) -> String {
    program
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl CompilerRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> Result<ExecutionOutput, ExecError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(invocation.clone());
        let name = program_name(&invocation.program);
        match self.scripts.get(&name).cloned().unwrap_or_else(Script::clean) {
            Script::Exit { status, stdout } => Ok(ExecutionOutput {
                status: Some(status),
                stdout,
                stderr: String::new(),
                duration: Duration::from_millis(5),
            }),
            Script::Timeout => Err(ExecError::Timeout {
                program: invocation.program.clone(),
                timeout: invocation.timeout,
            }),
            Script::SpawnFailure => Err(ExecError::Spawn {
                program: invocation.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            }),
        }
    }
}
