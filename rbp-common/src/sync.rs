//! Upload, remote run, cache patch, download and cleanup sequencing.

use crate::cmake_cache::CacheRewriter;
use crate::command::Command;
use crate::config::ToolchainConfig;
use crate::errors::Result;
use crate::path_mapping::MappedPaths;
use crate::rewrite::RemoteCommand;
use crate::transport::RemoteExecutor;
use crate::types::SyncPlan;
use std::path::Path;
use tracing::{debug, info, warn};

/// Pattern always kept out of uploads.
pub const VCS_EXCLUDE: &str = ".git";
/// Patterns kept out of downloads on top of the upload-side ones.
pub const DOWNLOAD_EXCLUDES: [&str; 1] = [".ssh"];

impl SyncPlan {
    /// Transfer plan for a mapped, non-passthrough invocation.
    ///
    /// `local_build_exists` decides both the download and whether the build
    /// dir names are excluded from the upload, so `--delete` never wipes the
    /// remote build trees living inside the source mirror. Downloads skip the
    /// VCS and configured patterns as well, since the local build dir may be
    /// the source dir itself.
    pub fn for_invocation(
        command: &Command,
        mapped: &MappedPaths,
        excludes: &[String],
        local_build_exists: bool,
    ) -> Self {
        let mut upload_excludes = excludes.to_vec();
        if !upload_excludes.iter().any(|e| e == VCS_EXCLUDE) {
            upload_excludes.insert(0, VCS_EXCLUDE.to_string());
        }
        let mut download_excludes: Vec<String> =
            DOWNLOAD_EXCLUDES.iter().map(|e| e.to_string()).collect();
        for pattern in &upload_excludes {
            if !download_excludes.contains(pattern) {
                download_excludes.push(pattern.clone());
            }
        }
        if local_build_exists {
            for dir in [&mapped.local.build_dir, &mapped.remote.build_dir] {
                if let Some(name) = dir.file_name().map(|n| n.to_string_lossy().into_owned())
                    && !upload_excludes.contains(&name)
                {
                    upload_excludes.push(name);
                }
            }
        }

        Self {
            upload: mapped.upload,
            download: local_build_exists,
            excludes: upload_excludes,
            download_excludes,
            rewrite_cache: command.is_generate(),
            cleanup: command.is_generate() && mapped.toolset_check,
        }
    }
}

/// Drives one remote cycle over a [`RemoteExecutor`].
pub struct SyncOrchestrator<'a, E: RemoteExecutor> {
    executor: &'a E,
    toolchain: &'a ToolchainConfig,
}

impl<'a, E: RemoteExecutor> SyncOrchestrator<'a, E> {
    pub fn new(executor: &'a E, toolchain: &'a ToolchainConfig) -> Self {
        Self {
            executor,
            toolchain,
        }
    }

    /// Forward a call that touches no mirrored tree.
    pub fn run_passthrough(&self, remote_command: &RemoteCommand) -> Result<i32> {
        let line = remote_command.command_line();
        let code = self.executor.run(&remote_command.as_run(None, &line))?;
        debug!(code, "passthrough finished");
        Ok(code)
    }

    /// Run the full cycle and return the remote exit code.
    ///
    /// A non-zero exit stops the cycle before any cache patch or download.
    pub fn execute(
        &self,
        mapped: &MappedPaths,
        plan: &SyncPlan,
        remote_command: &RemoteCommand,
    ) -> Result<i32> {
        let remote = &mapped.remote;
        let local = &mapped.local;
        let mut created: Vec<&Path> = Vec::new();

        if plan.upload {
            info!(
                from = %local.source_dir.display(),
                to = %remote.source_dir.display(),
                "uploading source tree"
            );
            self.executor.mkdir(&remote.source_dir)?;
            created.push(&remote.source_dir);
            if plan.download {
                self.executor.mkdir(&remote.build_dir)?;
                created.push(&remote.build_dir);
            }
            self.executor
                .upload(&local.source_dir, &remote.source_dir, &plan.excludes)?;
        }

        if !created.contains(&mapped.workdir.as_path()) {
            self.executor.mkdir(&mapped.workdir)?;
        }

        let line = remote_command.command_line();
        info!(workdir = %mapped.workdir.display(), "running remote command");
        let code = self
            .executor
            .run(&remote_command.as_run(Some(&mapped.workdir), &line))?;
        if code != 0 {
            info!(code, "remote command failed, skipping download");
            return Ok(code);
        }

        if plan.rewrite_cache {
            CacheRewriter::new(self.executor, self.toolchain).rewrite(
                local,
                remote,
                mapped.toolset_check,
            )?;
        }

        if plan.download {
            info!(
                from = %remote.build_dir.display(),
                to = %local.build_dir.display(),
                "downloading build tree"
            );
            self.executor
                .download(&remote.build_dir, &local.build_dir, &plan.download_excludes)?;
        }

        if plan.cleanup {
            for dir in [&remote.source_dir, &remote.build_dir] {
                if let Err(e) = self.executor.remove(dir) {
                    warn!(dir = %dir.display(), error = %e, "failed to clean up toolset probe");
                }
            }
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{BuildToolMode, PackageManagerMode};
    use crate::mock::{MockTransport, TransportCall};
    use crate::types::Environment;
    use std::path::PathBuf;

    fn mapped(upload: bool, workdir: &str, toolset_check: bool) -> MappedPaths {
        MappedPaths {
            local: Environment::new(
                PathBuf::from("/local/proj"),
                PathBuf::from("/local/proj/build"),
                PathBuf::from("/home/dev"),
            ),
            remote: Environment::new(
                PathBuf::from("/mnt/remote/local/proj"),
                PathBuf::from("/mnt/remote/local/proj/build"),
                PathBuf::from("/mnt/remote/home/dev"),
            ),
            workdir: PathBuf::from(workdir),
            source_arg: None,
            upload,
            toolset_check,
        }
    }

    fn command(line: &str) -> RemoteCommand {
        RemoteCommand {
            env: vec![("CC".to_string(), "gcc".to_string())],
            steps: vec![line.to_string()],
        }
    }

    const GENERATE: Command = Command::BuildTool(BuildToolMode::Generate);

    #[test]
    fn test_plan_excludes_build_dir_only_when_it_exists() {
        let m = mapped(true, "/mnt/remote/local/proj/build", false);
        let with = SyncPlan::for_invocation(&GENERATE, &m, &[], true);
        assert_eq!(with.excludes, vec![".git", "build"]);
        assert!(with.download);

        let without = SyncPlan::for_invocation(&GENERATE, &m, &[], false);
        assert_eq!(without.excludes, vec![".git"]);
        assert!(!without.download);
    }

    #[test]
    fn test_plan_keeps_configured_excludes_and_ninja_dir() {
        let mut m = mapped(true, "/mnt/remote/local/proj/build-ninja", false);
        m.remote.build_dir = PathBuf::from("/mnt/remote/local/proj/build-ninja");
        let plan = SyncPlan::for_invocation(
            &GENERATE,
            &m,
            &["target".to_string(), ".git".to_string()],
            true,
        );
        assert_eq!(plan.excludes, vec!["target", ".git", "build", "build-ninja"]);
        assert_eq!(plan.download_excludes, vec![".ssh", "target", ".git"]);
    }

    #[test]
    fn test_plan_flags_by_mode() {
        let m = mapped(true, "/w", true);
        let generate = SyncPlan::for_invocation(&GENERATE, &m, &[], true);
        assert!(generate.rewrite_cache && generate.cleanup);

        let install = SyncPlan::for_invocation(
            &Command::PackageManager(PackageManagerMode::Install),
            &m,
            &[],
            true,
        );
        assert!(!install.rewrite_cache && !install.cleanup);
    }

    #[test]
    fn test_full_cycle_order() {
        let m = mapped(true, "/mnt/remote/local/proj/build", false);
        let plan = SyncPlan::for_invocation(&GENERATE, &m, &[], true);
        let mock = MockTransport::new()
            .with_file("/mnt/remote/local/proj/build/CMakeCache.txt", "X=/mnt/remote/local/proj\n");
        let toolchain = ToolchainConfig::default();

        let code = SyncOrchestrator::new(&mock, &toolchain)
            .execute(&m, &plan, &command("cmake /mnt/remote/local/proj"))
            .unwrap();
        assert_eq!(code, 0);

        let calls = mock.calls();
        assert_eq!(calls[0], TransportCall::Mkdir(PathBuf::from("/mnt/remote/local/proj")));
        assert_eq!(calls[1], TransportCall::Mkdir(PathBuf::from("/mnt/remote/local/proj/build")));
        assert!(matches!(&calls[2], TransportCall::Upload { excludes, .. } if excludes == &vec![".git", "build"]));
        assert!(matches!(&calls[3], TransportCall::Run { workdir: Some(w), .. } if w == &m.workdir));
        assert!(matches!(&calls[4], TransportCall::ReplaceInFile { .. }));
        assert!(matches!(&calls[5], TransportCall::Download { excludes, .. } if excludes == &vec![".ssh", ".git"]));
        assert_eq!(calls.len(), 6);
        assert_eq!(
            mock.file("/mnt/remote/local/proj/build/CMakeCache.txt").as_deref(),
            Some("X=/local/proj\n")
        );
    }

    #[test]
    fn test_failed_run_skips_rewrite_and_download() {
        let m = mapped(true, "/mnt/remote/local/proj/build", false);
        let plan = SyncPlan::for_invocation(&GENERATE, &m, &[], true);
        let mock = MockTransport::new().with_exit_codes([1]);
        let toolchain = ToolchainConfig::default();

        let code = SyncOrchestrator::new(&mock, &toolchain)
            .execute(&m, &plan, &command("cmake .."))
            .unwrap();
        assert_eq!(code, 1);
        assert!(mock.downloads().is_empty());
        assert!(
            !mock
                .calls()
                .iter()
                .any(|c| matches!(c, TransportCall::ReplaceInFile { .. }))
        );
    }

    #[test]
    fn test_build_only_creates_scratch_dir() {
        let m = mapped(false, "/tmp/rbp-proj", false);
        let plan = SyncPlan::for_invocation(
            &Command::BuildTool(BuildToolMode::BuildOnly),
            &m,
            &[],
            true,
        );
        let mock = MockTransport::new();
        let toolchain = ToolchainConfig::default();
        SyncOrchestrator::new(&mock, &toolchain)
            .execute(&m, &plan, &command("cmake --build x"))
            .unwrap();

        assert!(mock.uploads().is_empty());
        assert_eq!(mock.calls()[0], TransportCall::Mkdir(PathBuf::from("/tmp/rbp-proj")));
        assert_eq!(mock.downloads().len(), 1);
    }

    #[test]
    fn test_toolset_check_cleans_up_and_tolerates_failures() {
        let m = mapped(true, "/mnt/remote/local/proj/build", true);
        let plan = SyncPlan::for_invocation(&GENERATE, &m, &[], true);
        let cache = "CMAKE_C_COMPILER:FILEPATH=/usr/bin/cc\n";
        let mock = MockTransport::new()
            .with_file("/mnt/remote/local/proj/build/CMakeCache.txt", cache)
            .failing("remove");
        let toolchain = ToolchainConfig {
            cc: "/opt/cc".to_string(),
            ..ToolchainConfig::default()
        };

        let code = SyncOrchestrator::new(&mock, &toolchain)
            .execute(&m, &plan, &command("cmake .."))
            .unwrap();
        assert_eq!(code, 0);
        let removes: Vec<_> = mock
            .calls()
            .into_iter()
            .filter(|c| matches!(c, TransportCall::Remove(_)))
            .collect();
        assert_eq!(removes.len(), 2);
    }

    #[test]
    fn test_transport_failure_aborts() {
        let m = mapped(true, "/mnt/remote/local/proj/build", false);
        let plan = SyncPlan::for_invocation(&GENERATE, &m, &[], true);
        let mock = MockTransport::new().failing("upload");
        let toolchain = ToolchainConfig::default();
        assert!(
            SyncOrchestrator::new(&mock, &toolchain)
                .execute(&m, &plan, &command("cmake .."))
                .is_err()
        );
        assert!(mock.runs().is_empty());
    }

    #[test]
    fn test_passthrough_single_run_without_workdir() {
        let mock = MockTransport::new().with_exit_codes([7]);
        let toolchain = ToolchainConfig::default();
        let code = SyncOrchestrator::new(&mock, &toolchain)
            .run_passthrough(&RemoteCommand {
                env: Vec::new(),
                steps: vec!["conan search zlib".to_string()],
            })
            .unwrap();
        assert_eq!(code, 7);
        assert_eq!(
            mock.calls(),
            vec![TransportCall::Run {
                workdir: None,
                env: Vec::new(),
                command: "conan search zlib".to_string(),
            }]
        );
    }
}
