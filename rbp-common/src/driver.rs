//! End-to-end handling of one proxied invocation.
//!
//! classify -> map paths -> validate -> lock -> rewrite -> sync/run.
//! Nothing touches the build host before validation has passed.

use crate::command::{BuildToolMode, Command, PackageManagerMode};
use crate::config::{PackageHomeSource, RbpConfig};
use crate::errors::{RemotingError, Result};
use crate::lock::MirrorLock;
use crate::path_mapping::{MappedPaths, PathMapper};
use crate::rewrite::{ArgumentRewriter, RemoteCommand};
use crate::sync::SyncOrchestrator;
use crate::transport::RemoteExecutor;
use crate::types::{Environment, Invocation, SyncPlan};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};

/// Remote variables consulted, in order, for the remote package home.
const REMOTE_HOME_VARS: [&str; 2] = ["CONAN_USER_HOME", "HOME"];

/// Everything decided about an invocation before anything runs.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub invocation: Invocation,
    pub command: Command,
    /// `None` for passthrough calls.
    pub paths: Option<MappedPaths>,
    pub sync: SyncPlan,
    pub remote_command: RemoteCommand,
}

/// Runs invocations against one build host.
pub struct Driver<E: RemoteExecutor> {
    config: RbpConfig,
    mapper: PathMapper,
    executor: E,
    local_package_home: PathBuf,
    lock_dir: Option<PathBuf>,
}

impl<E: RemoteExecutor> Driver<E> {
    pub fn new(config: RbpConfig, executor: E, local_package_home: PathBuf) -> Self {
        Self {
            mapper: config.path_mapper(),
            config,
            executor,
            local_package_home,
            lock_dir: None,
        }
    }

    /// Keep mirror locks in `dir` instead of the user data dir.
    pub fn with_lock_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = Some(dir.into());
        self
    }

    pub fn config(&self) -> &RbpConfig {
        &self.config
    }

    /// Plan an invocation, asking the build host for its package home if
    /// configured to.
    pub fn plan(&self, invocation: &Invocation) -> Result<Plan> {
        self.plan_with_home(invocation, |command, local| {
            self.remote_package_home(command, local)
        })
    }

    /// Plan without contacting the build host.
    ///
    /// A remotely resolved package home shows up as `$CONAN_USER_HOME`.
    pub fn plan_offline(&self, invocation: &Invocation) -> Result<Plan> {
        self.plan_with_home(invocation, |command, local| {
            match (self.config.remote.package_home, command) {
                (PackageHomeSource::Remote, Command::PackageManager(_)) => {
                    Ok(PathBuf::from(format!("${}", REMOTE_HOME_VARS[0])))
                }
                _ => Ok(self.mapper.mirror(&local.package_home)),
            }
        })
    }

    fn plan_with_home(
        &self,
        invocation: &Invocation,
        remote_home: impl Fn(&Command, &Environment) -> Result<PathBuf>,
    ) -> Result<Plan> {
        let command = Command::classify(invocation)?;
        let paths = self
            .mapper
            .map(&command, invocation, &self.local_package_home, |local| {
                validate(&command, local, &self.mapper)?;
                remote_home(&command, local)
            })?;

        let sync = match &paths {
            Some(mapped) => SyncPlan::for_invocation(
                &command,
                mapped,
                &self.config.sync.excludes,
                mapped.local.build_dir.is_dir(),
            ),
            None => SyncPlan::passthrough(),
        };
        let remote_command =
            ArgumentRewriter::new(&self.config.toolchain).rewrite(&command, invocation, paths.as_ref());

        Ok(Plan {
            invocation: invocation.clone(),
            command,
            paths,
            sync,
            remote_command,
        })
    }

    /// Proxy an invocation and return the remote exit code.
    pub fn run(&self, invocation: &Invocation) -> Result<i32> {
        let plan = self.plan(invocation)?;
        let orchestrator = SyncOrchestrator::new(&self.executor, &self.config.toolchain);

        let Some(paths) = &plan.paths else {
            info!(tool = %plan.command.tool(), "forwarding without sync");
            return orchestrator.run_passthrough(&plan.remote_command);
        };

        let _lock = if self.config.sync.mirror_lock {
            Some(self.lock_mirror(paths)?)
        } else {
            None
        };
        let code = orchestrator.execute(paths, &plan.sync, &plan.remote_command)?;
        info!(tool = %plan.command.tool(), code, "remote cycle finished");
        Ok(code)
    }

    fn lock_mirror(&self, paths: &MappedPaths) -> Result<MirrorLock> {
        let mirror = &paths.remote.source_dir;
        match &self.lock_dir {
            Some(dir) => MirrorLock::acquire_in(dir, mirror),
            None => MirrorLock::acquire(mirror),
        }
    }

    fn remote_package_home(&self, command: &Command, local: &Environment) -> Result<PathBuf> {
        let ask_remote = self.config.remote.package_home == PackageHomeSource::Remote
            && matches!(command, Command::PackageManager(_));
        if !ask_remote {
            return Ok(self.mapper.mirror(&local.package_home));
        }
        for name in REMOTE_HOME_VARS {
            if let Some(value) = self.executor.getenv(name)? {
                debug!(var = name, home = %value, "remote package home");
                return Ok(PathBuf::from(value));
            }
        }
        Err(RemotingError::transport(
            "getenv",
            "neither CONAN_USER_HOME nor HOME is set on the build host",
        ))
    }
}

/// Local checks that must pass before any remote action.
fn validate(command: &Command, local: &Environment, mapper: &PathMapper) -> Result<()> {
    if mapper.overlaps_root(&local.source_dir) {
        return Err(RemotingError::SourceOverlapsRemoteRoot {
            dir: local.source_dir.clone(),
            root: mapper.remote_root().to_path_buf(),
        });
    }
    match command {
        Command::BuildTool(BuildToolMode::Generate) => {
            if !local.cmake_lists().is_file() {
                return Err(RemotingError::MissingBuildDescription(local.source_dir.clone()));
            }
        }
        Command::PackageManager(PackageManagerMode::Install) => {
            if !local.conan_manifests().iter().any(|m| m.is_file()) {
                return Err(RemotingError::MissingManifest(local.source_dir.clone()));
            }
        }
        _ => {}
    }
    Ok(())
}
