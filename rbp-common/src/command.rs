//! Front-end classification.
//!
//! Decides which proxied tool was invoked and in which mode. Adding a third
//! front end means adding a [`Command`] arm and its mode enum.

use crate::errors::{RemotingError, Result};
use crate::path_mapping::absolutize;
use crate::types::Invocation;
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

/// Executable name of the build-system front end.
pub const CMAKE: &str = "cmake";
/// Executable name of the package-manager front end.
pub const CONAN: &str = "conan";

/// Proxied tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Cmake,
    Conan,
}

impl Tool {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            CMAKE => Some(Self::Cmake),
            CONAN => Some(Self::Conan),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Cmake => CMAKE,
            Self::Conan => CONAN,
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildToolMode {
    /// `-version` / `--version`.
    VersionProbe,
    /// `--build <dir>` against an already configured tree.
    BuildOnly,
    /// Generate/configure from a source directory.
    Generate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageManagerMode {
    /// `-v` / `--version`.
    VersionProbe,
    /// Info-style call (search, remote, profile...) forwarded unmodified.
    Passthrough,
    /// `install` or `build`: full upload/execute/download cycle.
    Install,
}

/// Classified invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "tool", content = "mode", rename_all = "snake_case")]
pub enum Command {
    BuildTool(BuildToolMode),
    PackageManager(PackageManagerMode),
}

/// Where an invocation's source tree lives and which argument named it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    /// Index into `Invocation::args` of the argument that named the tree.
    pub arg_index: Option<usize>,
}

impl Command {
    /// Classify an invocation by its program name and arguments.
    pub fn classify(invocation: &Invocation) -> Result<Self> {
        let name = invocation.tool_name();
        let command = match Tool::from_name(name) {
            Some(Tool::Cmake) => Self::BuildTool(Self::build_tool_mode(invocation)),
            Some(Tool::Conan) => Self::PackageManager(Self::package_manager_mode(invocation)),
            None => return Err(RemotingError::UnknownTool(name.to_string())),
        };
        debug!(tool = name, ?command, "classified invocation");
        Ok(command)
    }

    fn build_tool_mode(invocation: &Invocation) -> BuildToolMode {
        if invocation.has_arg("-version") || invocation.has_arg("--version") {
            BuildToolMode::VersionProbe
        } else if invocation.has_arg("--build") {
            BuildToolMode::BuildOnly
        } else {
            BuildToolMode::Generate
        }
    }

    fn package_manager_mode(invocation: &Invocation) -> PackageManagerMode {
        if invocation.has_arg("-v") || invocation.has_arg("--version") {
            PackageManagerMode::VersionProbe
        } else if invocation.has_arg("install") || invocation.has_arg("build") {
            PackageManagerMode::Install
        } else {
            PackageManagerMode::Passthrough
        }
    }

    pub fn tool(&self) -> Tool {
        match self {
            Self::BuildTool(_) => Tool::Cmake,
            Self::PackageManager(_) => Tool::Conan,
        }
    }

    pub fn is_version_probe(&self) -> bool {
        matches!(
            self,
            Self::BuildTool(BuildToolMode::VersionProbe)
                | Self::PackageManager(PackageManagerMode::VersionProbe)
        )
    }

    /// Calls forwarded as-is: no path mapping, no sync.
    pub fn is_passthrough(&self) -> bool {
        self.is_version_probe() || matches!(self, Self::PackageManager(PackageManagerMode::Passthrough))
    }

    pub fn is_build_only(&self) -> bool {
        matches!(self, Self::BuildTool(BuildToolMode::BuildOnly))
    }

    pub fn is_generate(&self) -> bool {
        matches!(self, Self::BuildTool(BuildToolMode::Generate))
    }

    /// Whether the local source tree has to be pushed before running.
    pub fn needs_upload(&self) -> bool {
        !self.is_passthrough() && !self.is_build_only()
    }

    /// Resolve the source tree this invocation works on.
    ///
    /// Returns `None` for passthrough calls, which never touch the mirror.
    pub fn locate_source(&self, invocation: &Invocation) -> Result<Option<SourceLocation>> {
        let cwd = invocation.cwd();
        let location = match self {
            _ if self.is_passthrough() => return Ok(None),
            Self::BuildTool(BuildToolMode::BuildOnly) => {
                let index = invocation
                    .args()
                    .iter()
                    .position(|a| a == "--build")
                    .map(|i| i + 1)
                    .filter(|i| *i < invocation.args().len())
                    .ok_or(RemotingError::MissingBuildTarget)?;
                let build_dir = absolutize(cwd, &invocation.args()[index]);
                let source_dir = build_dir
                    .parent()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| build_dir.clone());
                SourceLocation {
                    source_dir,
                    build_dir,
                    arg_index: Some(index),
                }
            }
            Self::BuildTool(_) => {
                let arg_index = invocation.args().len().checked_sub(1);
                let source_dir = match invocation.last_arg() {
                    Some(arg) => absolutize(cwd, arg),
                    None => cwd.to_path_buf(),
                };
                SourceLocation {
                    source_dir,
                    build_dir: cwd.to_path_buf(),
                    arg_index,
                }
            }
            Self::PackageManager(_) => {
                let (arg_index, source_dir) = conan_source_dir(invocation).ok_or_else(|| {
                    RemotingError::SourceDirectoryNotFound {
                        args: invocation.args().to_vec(),
                    }
                })?;
                SourceLocation {
                    source_dir,
                    build_dir: cwd.to_path_buf(),
                    arg_index: Some(arg_index),
                }
            }
        };
        debug!(
            source = %location.source_dir.display(),
            build = %location.build_dir.display(),
            "located source tree"
        );
        Ok(Some(location))
    }
}

/// First positional argument after the subcommand that exists on disk.
///
/// Options without `=` consume the following token as their value.
fn conan_source_dir(invocation: &Invocation) -> Option<(usize, PathBuf)> {
    let mut skip_next = false;
    for (index, arg) in invocation.args().iter().enumerate().skip(1) {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg.starts_with('-') {
            skip_next = !arg.contains('=');
            continue;
        }
        let candidate = absolutize(invocation.cwd(), arg);
        if candidate.exists() {
            return Some((index, candidate));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn inv(program: &str, args: &[&str], cwd: &str) -> Invocation {
        Invocation::new(program, args.iter().map(|s| s.to_string()).collect(), cwd)
    }

    #[test]
    fn test_unknown_tool_is_rejected() {
        let err = Command::classify(&inv("make", &["all"], "/")).unwrap_err();
        assert!(matches!(err, RemotingError::UnknownTool(name) if name == "make"));
    }

    #[test]
    fn test_classify_uses_base_name() {
        let cmd = Command::classify(&inv("/usr/local/bin/cmake", &[".."], "/w")).unwrap();
        assert_eq!(cmd, Command::BuildTool(BuildToolMode::Generate));
    }

    #[test]
    fn test_cmake_modes() {
        let cases: &[(&[&str], BuildToolMode)] = &[
            (&["--version"], BuildToolMode::VersionProbe),
            (&["-version"], BuildToolMode::VersionProbe),
            (&["--build", "out"], BuildToolMode::BuildOnly),
            (&["-G", "Unix Makefiles", ".."], BuildToolMode::Generate),
            (&[], BuildToolMode::Generate),
        ];
        for (args, expected) in cases {
            let cmd = Command::classify(&inv("cmake", args, "/w")).unwrap();
            assert_eq!(cmd, Command::BuildTool(*expected), "args: {args:?}");
        }
    }

    #[test]
    fn test_conan_modes() {
        let cases: &[(&[&str], PackageManagerMode)] = &[
            (&["--version"], PackageManagerMode::VersionProbe),
            (&["-v"], PackageManagerMode::VersionProbe),
            (&["install", "."], PackageManagerMode::Install),
            (&["build", "."], PackageManagerMode::Install),
            (&["search", "zlib"], PackageManagerMode::Passthrough),
            (&["remote", "list"], PackageManagerMode::Passthrough),
        ];
        for (args, expected) in cases {
            let cmd = Command::classify(&inv("conan", args, "/w")).unwrap();
            assert_eq!(cmd, Command::PackageManager(*expected), "args: {args:?}");
        }
    }

    #[test]
    fn test_upload_requirements() {
        assert!(Command::BuildTool(BuildToolMode::Generate).needs_upload());
        assert!(Command::PackageManager(PackageManagerMode::Install).needs_upload());
        assert!(!Command::BuildTool(BuildToolMode::BuildOnly).needs_upload());
        assert!(!Command::BuildTool(BuildToolMode::VersionProbe).needs_upload());
        assert!(!Command::PackageManager(PackageManagerMode::Passthrough).needs_upload());
    }

    #[test]
    fn test_build_only_source_is_parent_of_target() {
        let invocation = inv("cmake", &["--build", "build", "-j", "4"], "/local/proj");
        let cmd = Command::classify(&invocation).unwrap();
        let loc = cmd.locate_source(&invocation).unwrap().unwrap();
        assert_eq!(loc.build_dir, PathBuf::from("/local/proj/build"));
        assert_eq!(loc.source_dir, PathBuf::from("/local/proj"));
        assert_eq!(loc.arg_index, Some(1));
    }

    #[test]
    fn test_build_only_without_target_fails() {
        let invocation = inv("cmake", &["--build"], "/local/proj");
        let cmd = Command::classify(&invocation).unwrap();
        assert!(matches!(
            cmd.locate_source(&invocation),
            Err(RemotingError::MissingBuildTarget)
        ));
    }

    #[test]
    fn test_generate_uses_last_argument() {
        let invocation = inv("cmake", &["-DFOO=1", ".."], "/local/proj/build");
        let cmd = Command::classify(&invocation).unwrap();
        let loc = cmd.locate_source(&invocation).unwrap().unwrap();
        assert_eq!(loc.source_dir, PathBuf::from("/local/proj"));
        assert_eq!(loc.build_dir, PathBuf::from("/local/proj/build"));
        assert_eq!(loc.arg_index, Some(1));
    }

    #[test]
    fn test_conan_source_skips_option_values() {
        let tmp = TempDir::new().unwrap();
        // A directory named like the option value must not be picked up.
        fs::create_dir(tmp.path().join("os=Linux")).unwrap();
        let cwd = tmp.path().to_str().unwrap();

        let invocation = inv("conan", &["install", "-s", "os=Linux", "--build=missing", "."], cwd);
        let cmd = Command::classify(&invocation).unwrap();
        let loc = cmd.locate_source(&invocation).unwrap().unwrap();
        assert_eq!(loc.source_dir, tmp.path());
        assert_eq!(loc.arg_index, Some(4));
    }

    #[test]
    fn test_conan_source_missing() {
        let invocation = inv("conan", &["install", "does-not-exist-anywhere"], "/nonexistent");
        let cmd = Command::classify(&invocation).unwrap();
        assert!(matches!(
            cmd.locate_source(&invocation),
            Err(RemotingError::SourceDirectoryNotFound { .. })
        ));
    }

    #[test]
    fn test_passthrough_has_no_source() {
        let invocation = inv("conan", &["search", "zlib"], "/w");
        let cmd = Command::classify(&invocation).unwrap();
        assert_eq!(cmd.locate_source(&invocation).unwrap(), None);
    }
}
