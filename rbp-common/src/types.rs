//! Core value types shared by the remoting pipeline.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Build description file of the build-system front end.
pub const CMAKE_LISTS: &str = "CMakeLists.txt";
/// Generated cache file of the build-system front end.
pub const CMAKE_CACHE: &str = "CMakeCache.txt";
/// Accepted package-manager manifest names.
pub const CONAN_MANIFESTS: [&str; 2] = ["conanfile.py", "conanfile.txt"];
/// Build-info file the package manager generates for the build system.
pub const CONAN_BUILD_INFO: &str = "conanbuildinfo.cmake";

/// Immutable capture of one proxied tool invocation.
///
/// Every transformation returns a new value; nothing mutates `args` in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    cwd: PathBuf,
}

impl Invocation {
    pub fn new(program: impl Into<String>, args: Vec<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: cwd.into(),
        }
    }

    /// Capture from a full argv (program first).
    pub fn from_argv<I, S>(argv: I, cwd: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut iter = argv.into_iter().map(Into::into);
        let program = iter.next().unwrap_or_default();
        Self::new(program, iter.collect(), cwd)
    }

    /// Program as invoked, possibly with a directory part.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Base name of the invoked program (`/usr/local/bin/cmake` -> `cmake`).
    pub fn tool_name(&self) -> &str {
        Path::new(&self.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.program)
    }

    /// Arguments after the program name.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn has_arg(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }

    pub fn last_arg(&self) -> Option<&str> {
        self.args.last().map(String::as_str)
    }

    /// The argument directly following `flag`.
    pub fn arg_after(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|idx| self.args.get(idx + 1))
            .map(String::as_str)
    }

    /// Full argv, program first.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    pub fn with_program(&self, program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..self.clone()
        }
    }

    pub fn with_args(&self, args: Vec<String>) -> Self {
        Self {
            args,
            ..self.clone()
        }
    }

    /// Replace the trailing argument (appends when there are no arguments).
    pub fn with_last_arg(&self, value: impl Into<String>) -> Self {
        let mut args = self.args.clone();
        match args.last_mut() {
            Some(last) => *last = value.into(),
            None => args.push(value.into()),
        }
        self.with_args(args)
    }

    /// Replace the argument at `index`.
    pub fn with_arg_at(&self, index: usize, value: impl Into<String>) -> Self {
        let mut args = self.args.clone();
        if let Some(slot) = args.get_mut(index) {
            *slot = value.into();
        }
        self.with_args(args)
    }
}

/// One side (local or remote) of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Environment {
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    /// Package-manager home; the package cache lives under it.
    pub package_home: PathBuf,
}

impl Environment {
    pub fn new(source_dir: PathBuf, build_dir: PathBuf, package_home: PathBuf) -> Self {
        Self {
            source_dir,
            build_dir,
            package_home,
        }
    }

    /// Base name of the source directory.
    pub fn project(&self) -> String {
        self.source_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn cmake_lists(&self) -> PathBuf {
        self.source_dir.join(CMAKE_LISTS)
    }

    pub fn cmake_cache(&self) -> PathBuf {
        self.build_dir.join(CMAKE_CACHE)
    }

    pub fn conan_manifests(&self) -> [PathBuf; 2] {
        CONAN_MANIFESTS.map(|name| self.source_dir.join(name))
    }
}

/// Per-invocation transfer decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    /// Push the local source tree before running.
    pub upload: bool,
    /// Pull the remote build tree after a successful run.
    pub download: bool,
    /// Patterns skipped on upload.
    pub excludes: Vec<String>,
    /// Patterns skipped on download.
    pub download_excludes: Vec<String>,
    /// Patch the remote cache after a successful run.
    pub rewrite_cache: bool,
    /// Drop the remote mirror after download (toolset checks).
    pub cleanup: bool,
}

impl SyncPlan {
    /// Plan for calls that never touch the mirrored trees.
    pub fn passthrough() -> Self {
        Self {
            upload: false,
            download: false,
            excludes: Vec::new(),
            download_excludes: Vec::new(),
            rewrite_cache: false,
            cleanup: false,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        !self.upload && !self.download && !self.rewrite_cache && !self.cleanup
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inv(args: &[&str]) -> Invocation {
        Invocation::new(
            "/usr/bin/cmake",
            args.iter().map(|s| s.to_string()).collect(),
            "/work",
        )
    }

    #[test]
    fn test_tool_name_strips_directory() {
        assert_eq!(inv(&[]).tool_name(), "cmake");
        assert_eq!(Invocation::new("conan", vec![], "/").tool_name(), "conan");
    }

    #[test]
    fn test_from_argv_splits_program() {
        let inv = Invocation::from_argv(["conan", "install", "."], "/w");
        assert_eq!(inv.program(), "conan");
        assert_eq!(inv.args(), ["install", "."]);
        assert_eq!(inv.argv(), ["conan", "install", "."]);
    }

    #[test]
    fn test_transformations_do_not_mutate_original() {
        let original = inv(&["-G", "Ninja", ".."]);
        let rewritten = original.with_last_arg("/remote/src").with_program("/opt/cmake");

        assert_eq!(original.last_arg(), Some(".."));
        assert_eq!(original.program(), "/usr/bin/cmake");
        assert_eq!(rewritten.last_arg(), Some("/remote/src"));
        assert_eq!(rewritten.program(), "/opt/cmake");
    }

    #[test]
    fn test_with_last_arg_on_empty_appends() {
        assert_eq!(inv(&[]).with_last_arg("x").args(), ["x"]);
    }

    #[test]
    fn test_arg_after() {
        let inv = inv(&["--build", "out", "-j", "8"]);
        assert_eq!(inv.arg_after("--build"), Some("out"));
        assert_eq!(inv.arg_after("8"), None);
        assert_eq!(inv.arg_after("--target"), None);
    }

    #[test]
    fn test_environment_derived_paths() {
        let env = Environment::new(
            PathBuf::from("/src/proj"),
            PathBuf::from("/src/proj/build"),
            PathBuf::from("/home/dev"),
        );
        assert_eq!(env.project(), "proj");
        assert_eq!(env.cmake_lists(), PathBuf::from("/src/proj/CMakeLists.txt"));
        assert_eq!(env.cmake_cache(), PathBuf::from("/src/proj/build/CMakeCache.txt"));
        assert_eq!(
            env.conan_manifests(),
            [
                PathBuf::from("/src/proj/conanfile.py"),
                PathBuf::from("/src/proj/conanfile.txt")
            ]
        );
    }

    #[test]
    fn test_passthrough_plan() {
        assert!(SyncPlan::passthrough().is_passthrough());
    }
}
