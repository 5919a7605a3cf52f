//! Contract between the remoting engine and whatever moves bytes to the
//! build host.
//!
//! Every call blocks until the remote side is done. Primitive failures come
//! back as [`RemotingError::Transport`](crate::errors::RemotingError); the
//! engine does not look inside them.

use crate::errors::Result;
use std::path::Path;

/// Remote command to run: environment assignments plus a shell command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteRun<'a> {
    /// Directory to `cd` into first; the login directory when `None`.
    pub workdir: Option<&'a Path>,
    /// `KEY=VALUE` pairs exported for the whole command line.
    pub env: &'a [(String, String)],
    /// Shell command line, already quoted for the remote shell.
    pub command: &'a str,
}

/// Primitives the engine needs from the transport.
pub trait RemoteExecutor {
    /// Create a remote directory, including parents. Idempotent.
    fn mkdir(&self, path: &Path) -> Result<()>;

    /// Mirror a local tree into a remote directory, deleting extraneous files.
    fn upload(&self, local: &Path, remote: &Path, excludes: &[String]) -> Result<()>;

    /// Mirror a remote tree into a local directory, deleting extraneous files.
    fn download(&self, remote: &Path, local: &Path, excludes: &[String]) -> Result<()>;

    /// Run a shell command remotely and return its exit status.
    ///
    /// A non-zero status is not an error at this level.
    fn run(&self, run: &RemoteRun<'_>) -> Result<i32>;

    /// Read a variable from the remote login environment.
    fn getenv(&self, name: &str) -> Result<Option<String>>;

    /// Replace every literal occurrence of `from` with `to` in a remote file.
    fn replace_in_file(&self, path: &Path, from: &str, to: &str) -> Result<()>;

    /// Remove a remote path recursively.
    fn remove(&self, path: &Path) -> Result<()>;

    /// Read a remote text file.
    fn read_file(&self, path: &Path) -> Result<String>;

    /// Overwrite a remote text file.
    fn write_file(&self, path: &Path, content: &str) -> Result<()>;
}

/// Literal replacement backing [`RemoteExecutor::replace_in_file`].
///
/// `None` when `from` does not occur, so callers can skip the write.
pub fn replace_literal(content: &str, from: &str, to: &str) -> Option<String> {
    content.contains(from).then(|| content.replace(from, to))
}

impl<T: RemoteExecutor + ?Sized> RemoteExecutor for &T {
    fn mkdir(&self, path: &Path) -> Result<()> {
        (**self).mkdir(path)
    }

    fn upload(&self, local: &Path, remote: &Path, excludes: &[String]) -> Result<()> {
        (**self).upload(local, remote, excludes)
    }

    fn download(&self, remote: &Path, local: &Path, excludes: &[String]) -> Result<()> {
        (**self).download(remote, local, excludes)
    }

    fn run(&self, run: &RemoteRun<'_>) -> Result<i32> {
        (**self).run(run)
    }

    fn getenv(&self, name: &str) -> Result<Option<String>> {
        (**self).getenv(name)
    }

    fn replace_in_file(&self, path: &Path, from: &str, to: &str) -> Result<()> {
        (**self).replace_in_file(path, from, to)
    }

    fn remove(&self, path: &Path) -> Result<()> {
        (**self).remove(path)
    }

    fn read_file(&self, path: &Path) -> Result<String> {
        (**self).read_file(path)
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        (**self).write_file(path, content)
    }
}
