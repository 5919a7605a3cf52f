//! In-memory transport for tests.
//!
//! Records every primitive call in order and keeps a tiny remote filesystem
//! of text files, so pipelines can be asserted without ssh or rsync.

use crate::errors::{RemotingError, Result};
use crate::transport::{RemoteExecutor, RemoteRun, replace_literal};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Mkdir(PathBuf),
    Upload {
        local: PathBuf,
        remote: PathBuf,
        excludes: Vec<String>,
    },
    Download {
        remote: PathBuf,
        local: PathBuf,
        excludes: Vec<String>,
    },
    Run {
        workdir: Option<PathBuf>,
        env: Vec<(String, String)>,
        command: String,
    },
    Getenv(String),
    ReplaceInFile {
        path: PathBuf,
        from: String,
        to: String,
    },
    Remove(PathBuf),
    ReadFile(PathBuf),
    WriteFile(PathBuf),
}

impl TransportCall {
    /// Calls that move trees or create/remove remote directories.
    pub fn is_sync(&self) -> bool {
        matches!(
            self,
            Self::Mkdir(_) | Self::Upload { .. } | Self::Download { .. } | Self::Remove(_)
        )
    }
}

/// Recording transport with scripted results.
#[derive(Debug, Default)]
pub struct MockTransport {
    calls: RefCell<Vec<TransportCall>>,
    exit_codes: RefCell<VecDeque<i32>>,
    files: RefCell<BTreeMap<PathBuf, String>>,
    env: HashMap<String, String>,
    fail_operation: Option<&'static str>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exit status for the next `run` calls, in order; later runs return 0.
    pub fn with_exit_codes(self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.exit_codes.borrow_mut().extend(codes);
        self
    }

    /// Seed a remote file.
    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.borrow_mut().insert(path.into(), content.into());
        self
    }

    /// Seed a remote environment variable.
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    /// Make every call of the named primitive fail.
    pub fn failing(mut self, operation: &'static str) -> Self {
        self.fail_operation = Some(operation);
        self
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.borrow().clone()
    }

    /// Recorded `run` calls as `(workdir, env, command)`.
    pub fn runs(&self) -> Vec<(Option<PathBuf>, Vec<(String, String)>, String)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                TransportCall::Run {
                    workdir,
                    env,
                    command,
                } => Some((workdir.clone(), env.clone(), command.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn uploads(&self) -> Vec<TransportCall> {
        self.filtered(|c| matches!(c, TransportCall::Upload { .. }))
    }

    pub fn downloads(&self) -> Vec<TransportCall> {
        self.filtered(|c| matches!(c, TransportCall::Download { .. }))
    }

    /// Current content of a remote file.
    pub fn file(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.borrow().get(path.as_ref()).cloned()
    }

    fn filtered(&self, keep: impl Fn(&TransportCall) -> bool) -> Vec<TransportCall> {
        self.calls.borrow().iter().filter(|c| keep(c)).cloned().collect()
    }

    fn record(&self, operation: &'static str, call: TransportCall) -> Result<()> {
        self.calls.borrow_mut().push(call);
        if self.fail_operation == Some(operation) {
            return Err(RemotingError::transport(operation, "mock failure"));
        }
        Ok(())
    }
}

impl RemoteExecutor for MockTransport {
    fn mkdir(&self, path: &Path) -> Result<()> {
        self.record("mkdir", TransportCall::Mkdir(path.to_path_buf()))
    }

    fn upload(&self, local: &Path, remote: &Path, excludes: &[String]) -> Result<()> {
        self.record(
            "upload",
            TransportCall::Upload {
                local: local.to_path_buf(),
                remote: remote.to_path_buf(),
                excludes: excludes.to_vec(),
            },
        )
    }

    fn download(&self, remote: &Path, local: &Path, excludes: &[String]) -> Result<()> {
        self.record(
            "download",
            TransportCall::Download {
                remote: remote.to_path_buf(),
                local: local.to_path_buf(),
                excludes: excludes.to_vec(),
            },
        )
    }

    fn run(&self, run: &RemoteRun<'_>) -> Result<i32> {
        self.record(
            "run",
            TransportCall::Run {
                workdir: run.workdir.map(Path::to_path_buf),
                env: run.env.to_vec(),
                command: run.command.to_string(),
            },
        )?;
        Ok(self.exit_codes.borrow_mut().pop_front().unwrap_or(0))
    }

    fn getenv(&self, name: &str) -> Result<Option<String>> {
        self.record("getenv", TransportCall::Getenv(name.to_string()))?;
        Ok(self.env.get(name).cloned())
    }

    fn replace_in_file(&self, path: &Path, from: &str, to: &str) -> Result<()> {
        self.record(
            "replace_in_file",
            TransportCall::ReplaceInFile {
                path: path.to_path_buf(),
                from: from.to_string(),
                to: to.to_string(),
            },
        )?;
        let mut files = self.files.borrow_mut();
        let content = files.get_mut(path).ok_or_else(|| {
            RemotingError::transport("replace_in_file", format!("{}: no such file", path.display()))
        })?;
        if let Some(patched) = replace_literal(content, from, to) {
            *content = patched;
        }
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.record("remove", TransportCall::Remove(path.to_path_buf()))?;
        self.files.borrow_mut().retain(|file, _| !file.starts_with(path));
        Ok(())
    }

    fn read_file(&self, path: &Path) -> Result<String> {
        self.record("read_file", TransportCall::ReadFile(path.to_path_buf()))?;
        self.file(path).ok_or_else(|| {
            RemotingError::transport("read_file", format!("{}: no such file", path.display()))
        })
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        self.record("write_file", TransportCall::WriteFile(path.to_path_buf()))?;
        self.files
            .borrow_mut()
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }
}
