//! Error types for the command-remoting engine.
//!
//! Everything here is raised before or around the remote run. A failing remote
//! command is not an error: its exit status is handed back to the caller as-is.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while classifying, validating or orchestrating an invocation.
#[derive(Debug, Error)]
pub enum RemotingError {
    /// The invoked program is neither of the proxied front ends.
    #[error("Unknown command [{0}], use conan or cmake")]
    UnknownTool(String),

    /// No package-manager argument resolves to an existing path.
    #[error("Source directory not found in arguments: {}", .args.join(" "))]
    SourceDirectoryNotFound { args: Vec<String> },

    /// `--build` was passed without a target directory.
    #[error("--build requires a build directory argument")]
    MissingBuildTarget,

    /// Neither `conanfile.py` nor `conanfile.txt` exists in the source directory.
    #[error("conanfile.py or conanfile.txt does not exist in source directory {}", .0.display())]
    MissingManifest(PathBuf),

    /// `CMakeLists.txt` does not exist in the source directory.
    #[error("CMakeLists.txt does not exist in source directory {}", .0.display())]
    MissingBuildDescription(PathBuf),

    /// The local source dir and the remote root contain one another.
    #[error("Source directory {} overlaps the remote root {}", .dir.display(), .root.display())]
    SourceOverlapsRemoteRoot { dir: PathBuf, root: PathBuf },

    /// Another local invocation is already driving the same remote mirror.
    #[error("Remote mirror {} is in use by process {pid}", .mirror.display())]
    MirrorBusy { mirror: PathBuf, pid: u32 },

    /// A transport primitive failed (spawn failure or non-zero status).
    #[error("Transport failure during {operation}: {detail}")]
    Transport {
        operation: &'static str,
        detail: String,
    },

    /// Configuration could not be loaded or validated.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemotingError {
    /// Build a transport error for the given primitive.
    pub fn transport(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            detail: detail.into(),
        }
    }
}

/// Result type for remoting operations.
pub type Result<T> = std::result::Result<T, RemotingError>;
