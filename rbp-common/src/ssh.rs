//! ssh/rsync transport.
//!
//! Shells out to the system `ssh` and `rsync` binaries. Remote commands run
//! under `sh -lc` so the build host's login environment (toolchain `PATH`,
//! `CONAN_USER_HOME`) applies.

use crate::config::RemoteConfig;
use crate::errors::{RemotingError, Result};
use crate::transport::{RemoteExecutor, RemoteRun, replace_literal};
use crate::util::{is_valid_env_name, shell_quote, shell_quote_path};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output, Stdio};
use tracing::debug;

/// Exit code base for commands killed by a signal (128 + signal).
const EXIT_SIGNAL_BASE: i32 = 128;

/// Transport talking to one build host over ssh.
#[derive(Debug, Clone)]
pub struct SshTransport {
    host: String,
    port: u16,
    user: String,
    identity_file: Option<PathBuf>,
}

impl SshTransport {
    pub fn new(host: impl Into<String>, port: u16, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            identity_file: None,
        }
    }

    pub fn with_identity_file(mut self, identity_file: Option<PathBuf>) -> Self {
        self.identity_file = identity_file;
        self
    }

    pub fn from_config(config: &RemoteConfig) -> Self {
        Self::new(&config.host, config.port, &config.user)
            .with_identity_file(config.identity_file.clone())
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Connection options shared by ssh and rsync's `-e`.
    fn connection_options(&self) -> Vec<String> {
        let mut args = vec!["-o".to_string(), "BatchMode=yes".to_string()];
        if self.port != 22 {
            args.push("-p".to_string());
            args.push(self.port.to_string());
        }
        if let Some(identity) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity.to_string_lossy().into_owned());
        }
        args
    }

    /// Full ssh argv (without the program) for a remote command line.
    fn ssh_args(&self, remote_cmd: &str) -> Vec<String> {
        let mut args = vec!["-A".to_string(), "-q".to_string()];
        args.extend(self.connection_options());
        args.push(self.destination());
        args.push(build_remote_shell_command(remote_cmd));
        args
    }

    /// Value for rsync's `-e`.
    fn rsync_shell(&self) -> String {
        std::iter::once("ssh".to_string())
            .chain(self.connection_options().iter().map(|o| shell_quote(o).into_owned()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn rsync_args(&self, source: &str, dest: &str, excludes: &[String]) -> Vec<String> {
        let mut args = vec![
            "-trlH".to_string(),
            "--delete".to_string(),
            "-e".to_string(),
            self.rsync_shell(),
        ];
        for pattern in excludes {
            args.push("--exclude".to_string());
            args.push(pattern.clone());
        }
        args.push(format!("{}/", source.trim_end_matches('/')));
        args.push(dest.to_string());
        args
    }

    fn remote_spec(&self, path: &Path) -> String {
        format!("{}:{}", self.destination(), path.display())
    }

    fn ssh(&self, remote_cmd: &str) -> Command {
        debug!(host = %self.host, command = remote_cmd, "ssh");
        let mut cmd = Command::new("ssh");
        cmd.args(self.ssh_args(remote_cmd));
        cmd
    }

    /// Run a remote command with captured output, failing on non-zero status.
    fn ssh_output(&self, operation: &'static str, remote_cmd: &str, stdin: Option<&str>) -> Result<Output> {
        let mut cmd = self.ssh(remote_cmd);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = cmd
            .spawn()
            .map_err(|e| RemotingError::transport(operation, format!("failed to spawn ssh: {e}")))?;
        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes())
                .map_err(|e| RemotingError::transport(operation, e.to_string()))?;
        }
        let output = child
            .wait_with_output()
            .map_err(|e| RemotingError::transport(operation, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(RemotingError::transport(
                operation,
                format!("{} (status {})", stderr, exit_code(output.status)),
            ));
        }
        Ok(output)
    }

    fn rsync(&self, operation: &'static str, args: Vec<String>) -> Result<()> {
        debug!(?args, "rsync");
        let status = Command::new("rsync")
            .args(&args)
            .status()
            .map_err(|e| RemotingError::transport(operation, format!("failed to spawn rsync: {e}")))?;
        if !status.success() {
            return Err(RemotingError::transport(
                operation,
                format!("rsync exited with {}", exit_code(status)),
            ));
        }
        Ok(())
    }
}

/// Wrap a command line for the remote login shell.
fn build_remote_shell_command(remote_cmd: &str) -> String {
    format!("sh -lc {}", shell_quote(remote_cmd))
}

/// Shell script for a [`RemoteRun`]: `cd`, exports, then the command.
pub fn render_remote_run(run: &RemoteRun<'_>) -> String {
    let mut parts = Vec::new();
    if let Some(workdir) = run.workdir {
        parts.push(format!("cd {}", shell_quote_path(workdir)));
    }
    if !run.env.is_empty() {
        let assignments = run
            .env
            .iter()
            .map(|(key, value)| format!("{}={}", key, shell_quote(value)))
            .collect::<Vec<_>>()
            .join(" ");
        parts.push(format!("export {assignments}"));
    }
    parts.push(run.command.to_string());
    parts.join(" && ")
}

/// Remote file contents as text; files are written back whole, so no lossy decode.
fn decode_text(path: &Path, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| {
        RemotingError::transport(
            "read_file",
            format!("{}: not valid UTF-8 ({e})", path.display()),
        )
    })
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return EXIT_SIGNAL_BASE + signal;
        }
    }
    1
}

impl RemoteExecutor for SshTransport {
    fn mkdir(&self, path: &Path) -> Result<()> {
        self.ssh_output("mkdir", &format!("mkdir -p {}", shell_quote_path(path)), None)?;
        Ok(())
    }

    fn upload(&self, local: &Path, remote: &Path, excludes: &[String]) -> Result<()> {
        self.mkdir(remote)?;
        let args = self.rsync_args(&local.to_string_lossy(), &self.remote_spec(remote), excludes);
        self.rsync("upload", args)
    }

    fn download(&self, remote: &Path, local: &Path, excludes: &[String]) -> Result<()> {
        let args = self.rsync_args(&self.remote_spec(remote), &local.to_string_lossy(), excludes);
        self.rsync("download", args)
    }

    fn run(&self, run: &RemoteRun<'_>) -> Result<i32> {
        let script = render_remote_run(run);
        let status = self
            .ssh(&script)
            .status()
            .map_err(|e| RemotingError::transport("run", format!("failed to spawn ssh: {e}")))?;
        Ok(exit_code(status))
    }

    fn getenv(&self, name: &str) -> Result<Option<String>> {
        if !is_valid_env_name(name) {
            return Err(RemotingError::transport(
                "getenv",
                format!("invalid variable name '{name}'"),
            ));
        }
        let output = self.ssh_output("getenv", &format!("printf '%s' \"${name}\""), None)?;
        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Some(value).filter(|v| !v.is_empty()))
    }

    fn replace_in_file(&self, path: &Path, from: &str, to: &str) -> Result<()> {
        match replace_literal(&self.read_file(path)?, from, to) {
            Some(patched) => self.write_file(path, &patched),
            None => Ok(()),
        }
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.ssh_output("remove", &format!("rm -rf {}", shell_quote_path(path)), None)?;
        Ok(())
    }

    fn read_file(&self, path: &Path) -> Result<String> {
        let output = self.ssh_output("read_file", &format!("cat {}", shell_quote_path(path)), None)?;
        decode_text(path, output.stdout)
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        self.ssh_output(
            "write_file",
            &format!("cat > {}", shell_quote_path(path)),
            Some(content),
        )?;
        Ok(())
    }
}
