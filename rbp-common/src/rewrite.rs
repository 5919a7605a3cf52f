//! Remote command construction.
//!
//! Turns a classified invocation plus its mapped paths into the shell command
//! line run on the build host.

use crate::command::{BuildToolMode, Command, PackageManagerMode};
use crate::config::ToolchainConfig;
use crate::path_mapping::{MappedPaths, NINJA_BUILD_SUFFIX};
use crate::transport::RemoteRun;
use crate::types::{CONAN_BUILD_INFO, Invocation};
use crate::util::{join_command, shell_quote, shell_quote_path};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Generator name passed with `-G` when Ninja is configured.
pub const NINJA_GENERATOR: &str = "Ninja";

/// Command line for the build host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemoteCommand {
    /// Exported for the whole command line, in order.
    pub env: Vec<(String, String)>,
    /// Shell-ready steps, joined with `&&`.
    pub steps: Vec<String>,
}

impl RemoteCommand {
    fn push_argv<S: AsRef<str>>(&mut self, argv: &[S]) {
        self.steps.push(join_command(argv));
    }

    fn push_env(&mut self, key: &str, value: impl Into<String>) {
        self.env.push((key.to_string(), value.into()));
    }

    pub fn command_line(&self) -> String {
        self.steps.join(" && ")
    }

    /// Borrowed run request for the transport.
    pub fn as_run<'a>(&'a self, workdir: Option<&'a Path>, command_line: &'a str) -> RemoteRun<'a> {
        RemoteRun {
            workdir,
            env: &self.env,
            command: command_line,
        }
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{}={} ", key, shell_quote(value))?;
        }
        f.write_str(&self.command_line())
    }
}

/// Rewrites local invocations for the remote toolchain.
pub struct ArgumentRewriter<'a> {
    toolchain: &'a ToolchainConfig,
}

impl<'a> ArgumentRewriter<'a> {
    pub fn new(toolchain: &'a ToolchainConfig) -> Self {
        Self { toolchain }
    }

    /// Build the remote command. `mapped` is `None` only for passthrough calls.
    pub fn rewrite(
        &self,
        command: &Command,
        invocation: &Invocation,
        mapped: Option<&MappedPaths>,
    ) -> RemoteCommand {
        let program = self.remote_program(command);
        let remote = match mapped {
            Some(mapped) if !command.is_passthrough() => mapped,
            _ => {
                let mut out = RemoteCommand::default();
                out.push_argv(&invocation.with_program(program).argv());
                return out;
            }
        };

        let mut out = RemoteCommand::default();
        match command {
            Command::BuildTool(BuildToolMode::BuildOnly) => {
                self.push_toolchain_env(&mut out);
                let build = remote.remote.build_dir.to_string_lossy().into_owned();
                out.push_argv(&[program, "--build", build.as_str()]);
                out.push_argv(&[program, "--build", build.as_str(), "--target", "install"]);
            }
            Command::BuildTool(_) => {
                self.push_toolchain_env(&mut out);
                if self.toolchain.ninja().is_some() {
                    self.push_ninja_preparation(&mut out, &remote.remote.build_dir);
                }
                out.push_argv(&self.generate_argv(invocation, remote));
            }
            Command::PackageManager(PackageManagerMode::Install) => {
                out.push_env(
                    "CONAN_USER_HOME",
                    remote.remote.package_home.to_string_lossy(),
                );
                self.push_toolchain_env(&mut out);
                let source = remote.remote.source_dir.to_string_lossy();
                let rewritten = match remote.source_arg {
                    Some(index) => invocation.with_arg_at(index, source),
                    None => invocation.clone(),
                };
                out.push_argv(&rewritten.with_program(program).argv());
            }
            Command::PackageManager(_) => {
                out.push_argv(&invocation.with_program(program).argv());
            }
        }
        debug!(remote_command = %out, "rewrote invocation");
        out
    }

    fn remote_program(&self, command: &Command) -> &'a str {
        match command {
            Command::BuildTool(_) => &self.toolchain.cmake,
            Command::PackageManager(_) => &self.toolchain.conan,
        }
    }

    fn push_toolchain_env(&self, out: &mut RemoteCommand) {
        out.push_env("CC", self.toolchain.cc.as_str());
        out.push_env("CXX", self.toolchain.cxx.as_str());
        if let Some(fc) = self.toolchain.fc() {
            out.push_env("FC", fc);
        }
    }

    /// Create the Ninja build dir and seed it with the package build info.
    fn push_ninja_preparation(&self, out: &mut RemoteCommand, build_dir: &Path) {
        let plain = plain_build_dir(build_dir);
        let build_info = plain.join(CONAN_BUILD_INFO);
        let dir = build_dir.to_string_lossy();
        out.push_argv(&["mkdir", "-p", dir.as_ref()]);
        out.steps.push(format!(
            "{{ test ! -f {info} || cp {info} {dest}/; }}",
            info = shell_quote_path(&build_info),
            dest = shell_quote_path(build_dir),
        ));
    }

    fn generate_argv(&self, invocation: &Invocation, mapped: &MappedPaths) -> Vec<String> {
        let source = mapped.remote.source_dir.to_string_lossy();
        let rewritten = match mapped.source_arg {
            Some(index) => invocation.with_arg_at(index, source),
            None => invocation.with_last_arg(source),
        };

        let mut args = self.compiler_definitions();
        let mut user_args = rewritten.args().to_vec();
        match self.toolchain.ninja() {
            Some(ninja) => {
                if !replace_generator(&mut user_args, NINJA_GENERATOR) {
                    args.push("-G".to_string());
                    args.push(NINJA_GENERATOR.to_string());
                }
                args.push(format!("-DCMAKE_MAKE_PROGRAM={ninja}"));
            }
            None => args.push(format!("-DCMAKE_MAKE_PROGRAM={}", self.toolchain.make)),
        }
        args.extend(user_args);
        rewritten.with_program(self.toolchain.cmake.as_str()).with_args(args).argv()
    }

    fn compiler_definitions(&self) -> Vec<String> {
        let mut defs = vec![
            format!("-DCMAKE_C_COMPILER={}", self.toolchain.cc),
            format!("-DCMAKE_CXX_COMPILER={}", self.toolchain.cxx),
        ];
        if let Some(fc) = self.toolchain.fc() {
            defs.push(format!("-DCMAKE_Fortran_COMPILER={fc}"));
        }
        if let Some(launcher) = self.toolchain.compiler_launcher() {
            defs.push(format!("-DCMAKE_C_COMPILER_LAUNCHER={launcher}"));
            defs.push(format!("-DCMAKE_CXX_COMPILER_LAUNCHER={launcher}"));
        }
        defs
    }
}

/// Swap any `-G <gen>` / `-G<gen>` for `generator`. Returns whether one was found.
fn replace_generator(args: &mut Vec<String>, generator: &str) -> bool {
    let mut found = false;
    let mut idx = 0;
    while idx < args.len() {
        if args[idx] == "-G" {
            found = true;
            if idx + 1 < args.len() {
                args[idx + 1] = generator.to_string();
            } else {
                args.push(generator.to_string());
            }
            idx += 2;
            continue;
        }
        if args[idx].starts_with("-G") {
            args[idx] = format!("-G{generator}");
            found = true;
        }
        idx += 1;
    }
    found
}

/// Mirrored build dir without the Ninja suffix.
fn plain_build_dir(build_dir: &Path) -> PathBuf {
    let text = build_dir.to_string_lossy();
    PathBuf::from(text.strip_suffix(NINJA_BUILD_SUFFIX).unwrap_or(&text))
}
