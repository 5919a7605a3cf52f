//! Local to mirrored-remote path mapping.
//!
//! The remote host keeps one mirror tree per configured root: a local absolute
//! path `P` lives at `<root>/P` remotely, so the mirror reproduces the local
//! directory structure exactly one level under the root.

use crate::command::{Command, SourceLocation};
use crate::errors::Result;
use crate::types::{Environment, Invocation};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Suffix of the remote build directory dedicated to the Ninja generator.
pub const NINJA_BUILD_SUFFIX: &str = "-ninja";

/// Default prefixes marking IDE toolset probes run in disposable directories.
pub const DEFAULT_TOOLSET_CHECK_PREFIXES: [&str; 2] = ["/private/", "/tmp/"];

/// Resolve `path` against `cwd` and drop `.`/`..` components lexically.
///
/// The filesystem is not consulted, so symlinks are kept as written.
pub fn absolutize(cwd: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Local and remote sides of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappedPaths {
    pub local: Environment,
    pub remote: Environment,
    /// Remote directory the command runs in.
    pub workdir: PathBuf,
    /// Index into the invocation's arguments of the source-tree argument.
    pub source_arg: Option<usize>,
    pub upload: bool,
    pub toolset_check: bool,
}

/// Maps local paths into the remote mirror.
#[derive(Debug, Clone)]
pub struct PathMapper {
    remote_root: PathBuf,
    scratch_root: PathBuf,
    toolset_check_prefixes: Vec<String>,
    generator_suffix: Option<String>,
}

impl PathMapper {
    pub fn new(remote_root: impl Into<PathBuf>) -> Self {
        Self {
            remote_root: remote_root.into(),
            scratch_root: PathBuf::from("/tmp"),
            toolset_check_prefixes: DEFAULT_TOOLSET_CHECK_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            generator_suffix: None,
        }
    }

    /// Remote directory under which build-only steps get their scratch dir.
    pub fn with_scratch_root(mut self, scratch_root: impl Into<PathBuf>) -> Self {
        self.scratch_root = scratch_root.into();
        self
    }

    pub fn with_toolset_check_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.toolset_check_prefixes = prefixes;
        self
    }

    /// Give build-system invocations a generator-specific remote build dir.
    pub fn with_generator_suffix(mut self, suffix: Option<String>) -> Self {
        self.generator_suffix = suffix;
        self
    }

    pub fn remote_root(&self) -> &Path {
        &self.remote_root
    }

    /// Mirrored remote counterpart of an absolute local path.
    pub fn mirror(&self, local: &Path) -> PathBuf {
        let relative = local.strip_prefix("/").unwrap_or(local);
        self.remote_root.join(relative)
    }

    /// Whether `local` and the remote root nest inside one another.
    ///
    /// Mirrored paths then contain each other textually and the cache prefix
    /// swap stops being idempotent. A `/` root mirrors paths onto themselves
    /// and never overlaps.
    pub fn overlaps_root(&self, local: &Path) -> bool {
        self.remote_root != Path::new("/")
            && (local.starts_with(&self.remote_root) || self.remote_root.starts_with(local))
    }

    /// Inverse of [`PathMapper::mirror`]; `None` for paths outside the root.
    pub fn unmirror(&self, remote: &Path) -> Option<PathBuf> {
        remote
            .strip_prefix(&self.remote_root)
            .ok()
            .map(|relative| Path::new("/").join(relative))
    }

    /// Local side of the build for a located source tree.
    pub fn local_environment(&self, location: &SourceLocation, package_home: &Path) -> Environment {
        Environment::new(
            location.source_dir.clone(),
            location.build_dir.clone(),
            package_home.to_path_buf(),
        )
    }

    /// Remote side of the build, derived from the local side.
    pub fn remote_environment(
        &self,
        command: &Command,
        local: &Environment,
        remote_package_home: &Path,
    ) -> Environment {
        let mut build_dir = self.mirror(&local.build_dir);
        if let (Command::BuildTool(_), Some(suffix)) = (command, &self.generator_suffix) {
            let mut name = build_dir.into_os_string();
            name.push(suffix);
            build_dir = PathBuf::from(name);
        }
        Environment::new(
            self.mirror(&local.source_dir),
            build_dir,
            remote_package_home.to_path_buf(),
        )
    }

    /// Whether a local tree looks like a disposable IDE toolchain probe.
    pub fn is_toolset_check(&self, local: &Environment) -> bool {
        let source = local.source_dir.to_string_lossy();
        let build = local.build_dir.to_string_lossy();
        self.toolset_check_prefixes
            .iter()
            .any(|prefix| source.starts_with(prefix.as_str()) || build.starts_with(prefix.as_str()))
    }

    /// Scratch directory build-only steps run in.
    pub fn scratch_dir(&self, local: &Environment) -> PathBuf {
        self.scratch_root.join(format!("rbp-{}", local.project()))
    }

    /// Build both environments for a classified invocation.
    ///
    /// `remote_package_home` is only consulted once the local side has been
    /// resolved, so callers can defer any remote lookup behind it.
    pub fn map(
        &self,
        command: &Command,
        invocation: &Invocation,
        local_package_home: &Path,
        remote_package_home: impl FnOnce(&Environment) -> Result<PathBuf>,
    ) -> Result<Option<MappedPaths>> {
        let Some(location) = command.locate_source(invocation)? else {
            return Ok(None);
        };
        let local = self.local_environment(&location, local_package_home);
        let remote_home = remote_package_home(&local)?;
        let remote = self.remote_environment(command, &local, &remote_home);
        let workdir = if command.is_build_only() {
            self.scratch_dir(&local)
        } else {
            remote.build_dir.clone()
        };
        let toolset_check = self.is_toolset_check(&local);

        debug!(
            local_source = %local.source_dir.display(),
            remote_source = %remote.source_dir.display(),
            remote_build = %remote.build_dir.display(),
            toolset_check,
            "mapped paths"
        );

        Ok(Some(MappedPaths {
            upload: command.needs_upload(),
            local,
            remote,
            workdir,
            source_arg: location.arg_index,
            toolset_check,
        }))
    }
}
