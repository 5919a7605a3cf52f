//! Configuration for the remote build proxy.
//!
//! Values are layered: built-in defaults, then the TOML config file
//! (`$RBP_CONFIG` or `<config dir>/rbp/config.toml`), then `RBP_*`
//! environment variables.

pub mod env;
pub mod source;

pub use env::{EnvError, EnvParser};
pub use source::{ConfigSource, Sourced};

use crate::errors::{RemotingError, Result};
use crate::path_mapping::{DEFAULT_TOOLSET_CHECK_PREFIXES, NINJA_BUILD_SUFFIX, PathMapper};
use directories::ProjectDirs;
use env::layered;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Full configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RbpConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error, off).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Build host and mirror location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_user")]
    pub user: String,
    /// SSH private key; the agent/ssh config is used when unset.
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
    /// Root of the mirrored tree on the build host.
    #[serde(default = "default_remote_dir")]
    pub remote_dir: PathBuf,
    /// Where the remote package-manager home comes from.
    #[serde(default)]
    pub package_home: PackageHomeSource,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            identity_file: None,
            remote_dir: default_remote_dir(),
            package_home: PackageHomeSource::default(),
        }
    }
}

/// How the remote package-manager home is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageHomeSource {
    /// Mirror the local home under the remote root.
    #[default]
    Mirrored,
    /// Ask the build host for `CONAN_USER_HOME`, falling back to `HOME`.
    Remote,
}

impl std::str::FromStr for PackageHomeSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mirrored" => Ok(Self::Mirrored),
            "remote" => Ok(Self::Remote),
            other => Err(format!("unknown package home source '{other}'")),
        }
    }
}

/// Remote toolchain program paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolchainConfig {
    #[serde(default = "default_cmake")]
    pub cmake: String,
    #[serde(default = "default_conan")]
    pub conan: String,
    #[serde(default = "default_cc")]
    pub cc: String,
    #[serde(default = "default_cxx")]
    pub cxx: String,
    #[serde(default)]
    pub fc: Option<String>,
    #[serde(default = "default_make")]
    pub make: String,
    /// Setting this switches generate steps to the Ninja generator.
    #[serde(default)]
    pub ninja: Option<String>,
    /// Compiler launcher such as ccache or sccache.
    #[serde(default)]
    pub compiler_launcher: Option<String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            cmake: default_cmake(),
            conan: default_conan(),
            cc: default_cc(),
            cxx: default_cxx(),
            fc: None,
            make: default_make(),
            ninja: None,
            compiler_launcher: None,
        }
    }
}

impl ToolchainConfig {
    /// The configured Ninja path, ignoring empty values.
    pub fn ninja(&self) -> Option<&str> {
        self.ninja.as_deref().filter(|n| !n.is_empty())
    }

    pub fn compiler_launcher(&self) -> Option<&str> {
        self.compiler_launcher.as_deref().filter(|l| !l.is_empty())
    }

    pub fn fc(&self) -> Option<&str> {
        self.fc.as_deref().filter(|f| !f.is_empty())
    }

    /// Program that drives the generated build.
    pub fn make_program(&self) -> &str {
        self.ninja().unwrap_or(&self.make)
    }
}

/// Transfer behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Extra upload exclude patterns; `.git` is always excluded.
    #[serde(default = "default_excludes")]
    pub excludes: Vec<String>,
    /// Local path prefixes that mark disposable IDE toolset probes.
    #[serde(default = "default_toolset_check_prefixes")]
    pub toolset_check_prefixes: Vec<String>,
    /// Remote directory holding scratch dirs for build-only steps.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    /// Hold a local lock per mirrored project while a cycle runs.
    #[serde(default = "default_true")]
    pub mirror_lock: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            excludes: default_excludes(),
            toolset_check_prefixes: default_toolset_check_prefixes(),
            scratch_dir: default_scratch_dir(),
            mirror_lock: true,
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    22
}

fn default_user() -> String {
    std::env::var("USER").unwrap_or_else(|_| "root".to_string())
}

fn default_remote_dir() -> PathBuf {
    PathBuf::from("/var/tmp/rbp")
}

fn default_cmake() -> String {
    "cmake".to_string()
}

fn default_conan() -> String {
    "conan".to_string()
}

fn default_cc() -> String {
    "cc".to_string()
}

fn default_cxx() -> String {
    "c++".to_string()
}

fn default_make() -> String {
    "make".to_string()
}

fn default_excludes() -> Vec<String> {
    vec![".git".to_string()]
}

fn default_toolset_check_prefixes() -> Vec<String> {
    DEFAULT_TOOLSET_CHECK_PREFIXES
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_true() -> bool {
    true
}

/// Get the rbp config directory path.
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("dev", "rbp", "rbp").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Config file location: `$RBP_CONFIG` or `<config dir>/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    match std::env::var("RBP_CONFIG") {
        Ok(path) if !path.is_empty() => Some(PathBuf::from(shellexpand::tilde(&path).as_ref())),
        _ => config_dir().map(|dir| dir.join("config.toml")),
    }
}

/// Local package-manager home: `CONAN_USER_HOME`, falling back to the user home.
pub fn local_package_home() -> Option<PathBuf> {
    package_home_with_lookup(|key| std::env::var(key).ok()).or_else(dirs::home_dir)
}

/// Resolve a package-manager home from `CONAN_USER_HOME`/`HOME` via `lookup`.
pub fn package_home_with_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    ["CONAN_USER_HOME", "HOME"]
        .iter()
        .find_map(|key| lookup(key).filter(|v| !v.trim().is_empty()))
        .map(|v| PathBuf::from(v.trim()))
}

/// One value that an environment variable overrode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvOverride {
    pub key: &'static str,
    pub var: String,
}

/// Configuration plus where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: RbpConfig,
    /// File that was read, if any.
    pub file: Option<PathBuf>,
    pub overrides: Vec<EnvOverride>,
}

impl RbpConfig {
    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| RemotingError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| RemotingError::Config(e.to_string()))
    }

    /// Load defaults, the config file and the process environment.
    pub fn load() -> Result<LoadedConfig> {
        Self::load_from(config_path().as_deref(), EnvParser::new())
    }

    /// Load from an explicit file (missing files are skipped) and env parser.
    pub fn load_from(path: Option<&Path>, mut parser: EnvParser) -> Result<LoadedConfig> {
        let (config, file) = match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)?;
                let config = Self::from_toml(&content).map_err(|e| {
                    RemotingError::Config(format!("{}: {}", path.display(), e))
                })?;
                debug!(path = %path.display(), "loaded config file");
                (config, Some(path.to_path_buf()))
            }
            _ => (Self::default(), None),
        };

        let (config, overrides) = config.apply_env(&mut parser, file.is_some());
        let errors = parser.take_errors();
        if !errors.is_empty() {
            let message = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(RemotingError::Config(message));
        }
        config.validate()?;

        Ok(LoadedConfig {
            config,
            file,
            overrides,
        })
    }

    fn apply_env(self, p: &mut EnvParser, from_file: bool) -> (Self, Vec<EnvOverride>) {
        let mut overrides = Vec::new();
        let mut track = |key: &'static str, var: Option<String>| {
            if let Some(var) = var {
                overrides.push(EnvOverride { key, var });
            }
        };
        let f = from_file;

        macro_rules! layer {
            ($key:literal, $call:expr) => {{
                let sourced = $call;
                track($key, sourced.env_var);
                sourced.value
            }};
        }

        let general = GeneralConfig {
            log_level: layer!(
                "general.log_level",
                p.get_log_level("LOG_LEVEL", layered(self.general.log_level, f))
            ),
        };

        let remote = RemoteConfig {
            host: layer!("remote.host", p.get_string("HOST", layered(self.remote.host, f))),
            port: layer!(
                "remote.port",
                p.get_u16_range("PORT", layered(self.remote.port, f), 1, u16::MAX)
            ),
            user: layer!("remote.user", p.get_string("USER", layered(self.remote.user, f))),
            identity_file: layer!(
                "remote.identity_file",
                p.get_optional_string(
                    "IDENTITY_FILE",
                    layered(
                        self.remote
                            .identity_file
                            .map(|path| path.to_string_lossy().into_owned()),
                        f
                    )
                )
            )
            .map(|path| PathBuf::from(shellexpand::tilde(&path).as_ref())),
            remote_dir: layer!(
                "remote.remote_dir",
                p.get_path("REMOTE_DIR", layered(self.remote.remote_dir, f))
            ),
            package_home: layer!(
                "remote.package_home",
                p.get_parsed(
                    "PACKAGE_HOME",
                    layered(self.remote.package_home, f),
                    "mirrored or remote"
                )
            ),
        };

        let t = self.toolchain;
        let toolchain = ToolchainConfig {
            cmake: layer!("toolchain.cmake", p.get_string("CMAKE", layered(t.cmake, f))),
            conan: layer!("toolchain.conan", p.get_string("CONAN", layered(t.conan, f))),
            cc: layer!("toolchain.cc", p.get_string("CC", layered(t.cc, f))),
            cxx: layer!("toolchain.cxx", p.get_string("CXX", layered(t.cxx, f))),
            fc: layer!("toolchain.fc", p.get_optional_string("FC", layered(t.fc, f))),
            make: layer!("toolchain.make", p.get_string("MAKE", layered(t.make, f))),
            ninja: layer!(
                "toolchain.ninja",
                p.get_optional_string("NINJA", layered(t.ninja, f))
            ),
            compiler_launcher: layer!(
                "toolchain.compiler_launcher",
                p.get_optional_string("COMPILER_LAUNCHER", layered(t.compiler_launcher, f))
            ),
        };

        let s = self.sync;
        let sync = SyncConfig {
            excludes: layer!(
                "sync.excludes",
                p.get_string_list("EXCLUDES", layered(s.excludes, f))
            ),
            toolset_check_prefixes: layer!(
                "sync.toolset_check_prefixes",
                p.get_string_list(
                    "TOOLSET_CHECK_PREFIXES",
                    layered(s.toolset_check_prefixes, f)
                )
            ),
            scratch_dir: layer!(
                "sync.scratch_dir",
                p.get_path("SCRATCH_DIR", layered(s.scratch_dir, f))
            ),
            mirror_lock: layer!(
                "sync.mirror_lock",
                p.get_bool("MIRROR_LOCK", layered(s.mirror_lock, f))
            ),
        };

        (
            Self {
                general,
                remote,
                toolchain,
                sync,
            },
            overrides,
        )
    }

    /// Reject configurations the mapper cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !self.remote.remote_dir.is_absolute() {
            return Err(RemotingError::Config(format!(
                "remote_dir must be absolute, got {}",
                self.remote.remote_dir.display()
            )));
        }
        if self.remote.host.trim().is_empty() {
            return Err(RemotingError::Config("remote host is empty".to_string()));
        }
        Ok(())
    }

    /// Path mapper configured for this setup.
    pub fn path_mapper(&self) -> PathMapper {
        PathMapper::new(self.remote.remote_dir.clone())
            .with_scratch_root(self.sync.scratch_dir.clone())
            .with_toolset_check_prefixes(self.sync.toolset_check_prefixes.clone())
            .with_generator_suffix(
                self.toolchain
                    .ninja()
                    .map(|_| NINJA_BUILD_SUFFIX.to_string()),
            )
    }
}
