use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Strip inherited `RBP_*` overrides and point the config at `config_dir`
/// (no file there, so defaults apply) with the mirror rooted at `/mnt/remote`.
pub fn hermetic<'a>(cmd: &'a mut Command, config_dir: &Path) -> &'a mut Command {
    for (key, _) in std::env::vars() {
        if key.starts_with("RBP_") {
            cmd.env_remove(key);
        }
    }
    cmd.env("RBP_CONFIG", config_dir.join("config.toml"))
        .env("RBP_REMOTE_DIR", "/mnt/remote")
        .env("RBP_TOOLSET_CHECK_PREFIXES", "/nonexistent-probe-prefix/")
        .env("HOME", config_dir)
        .env_remove("CONAN_USER_HOME")
}

/// The rbp binary with a hermetic environment.
pub fn rbp(config_dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_rbp"));
    hermetic(&mut cmd, config_dir);
    cmd
}

/// Temporary C++ project with `proj/` and `proj/build/`.
pub struct TestProject {
    pub dir: TempDir,
    pub source: PathBuf,
    pub build: PathBuf,
}

impl TestProject {
    pub fn new() -> Self {
        crate::test_log!("FIXTURE: Creating test project");

        let dir = TempDir::new().expect("Failed to create temp dir");
        let source = dir.path().join("proj");
        let build = source.join("build");
        fs::create_dir_all(&build).expect("Failed to create build dir");

        Self { dir, source, build }
    }

    pub fn with_cmake_lists(self) -> Self {
        fs::write(
            self.source.join("CMakeLists.txt"),
            "cmake_minimum_required(VERSION 3.16)\nproject(proj CXX)\n",
        )
        .expect("Failed to write CMakeLists.txt");
        self
    }

    pub fn with_conanfile(self) -> Self {
        fs::write(self.source.join("conanfile.txt"), "[requires]\nzlib/1.3.1\n")
            .expect("Failed to write conanfile.txt");
        self
    }
}
