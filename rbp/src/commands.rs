//! Command implementations for the rbp binary.

use anyhow::{Context, Result, bail};
use rbp_common::command::{BuildToolMode, CMAKE, CONAN, PackageManagerMode};
use rbp_common::config::{self, LoadedConfig, RbpConfig};
use rbp_common::{Command, Driver, Invocation, LogConfig, Plan, SshTransport, init_logging};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Base name of `argv[0]`.
pub fn program_name(arg0: &str) -> String {
    Path::new(arg0)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| arg0.to_string())
}

pub fn load_config() -> Result<LoadedConfig> {
    Ok(RbpConfig::load()?)
}

pub fn init_cli_logging(config: &RbpConfig, verbose: bool) -> Result<()> {
    let mut log_config = LogConfig::from_env(&config.general.log_level);
    if verbose {
        log_config = log_config.with_level("debug");
    }
    init_logging(&log_config)?;
    Ok(())
}

fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().context("Failed to determine current directory")
}

fn driver(config: &RbpConfig) -> Result<Driver<SshTransport>> {
    let home = config::local_package_home()
        .context("Could not determine local package home (set CONAN_USER_HOME or HOME)")?;
    let transport = SshTransport::from_config(&config.remote);
    Ok(Driver::new(config.clone(), transport, home))
}

/// Invoked through a `cmake`/`conan` shim: `argv` is the tool's own command line.
pub fn proxy(argv: Vec<String>) -> Result<i32> {
    let loaded = load_config()?;
    init_logging(&LogConfig::from_env(&loaded.config.general.log_level))?;
    let invocation = Invocation::from_argv(argv, current_dir()?);
    debug!(argv = ?invocation.argv(), "proxying");
    Ok(driver(&loaded.config)?.run(&invocation)?)
}

/// `rbp run <tool> [args]...`
pub fn run_tool(config: &RbpConfig, tool: String, args: Vec<String>) -> Result<i32> {
    let invocation = Invocation::new(tool, args, current_dir()?);
    let code = driver(config)?
        .run(&invocation)
        .with_context(|| format!("Failed to proxy {}", invocation.tool_name()))?;
    Ok(code)
}

/// `rbp classify <tool> [args]...`
pub fn classify(config: &RbpConfig, tool: String, args: Vec<String>, json: bool) -> Result<i32> {
    let invocation = Invocation::new(tool, args, current_dir()?);
    let plan = driver(config)?.plan_offline(&invocation)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print!("{}", render_plan(&plan));
    }
    Ok(0)
}

fn describe(command: &Command) -> &'static str {
    match command {
        Command::BuildTool(BuildToolMode::VersionProbe)
        | Command::PackageManager(PackageManagerMode::VersionProbe) => "version probe",
        Command::BuildTool(BuildToolMode::BuildOnly) => "build only",
        Command::BuildTool(BuildToolMode::Generate) => "generate",
        Command::PackageManager(PackageManagerMode::Passthrough) => "passthrough",
        Command::PackageManager(PackageManagerMode::Install) => "install",
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

/// Human-readable dry-run report.
pub fn render_plan(plan: &Plan) -> String {
    let mut out = String::new();
    out.push_str(&format!("Tool:            {} ({})\n", plan.command.tool(), describe(&plan.command)));
    if let Some(paths) = &plan.paths {
        out.push_str(&format!("Local source:    {}\n", paths.local.source_dir.display()));
        out.push_str(&format!("Local build:     {}\n", paths.local.build_dir.display()));
        out.push_str(&format!("Remote source:   {}\n", paths.remote.source_dir.display()));
        out.push_str(&format!("Remote build:    {}\n", paths.remote.build_dir.display()));
        out.push_str(&format!("Remote workdir:  {}\n", paths.workdir.display()));
        out.push_str(&format!("Package home:    {}\n", paths.remote.package_home.display()));
        out.push_str(&format!("Toolset check:   {}\n", yes_no(paths.toolset_check)));
    }
    let sync = &plan.sync;
    out.push_str(&format!("Upload:          {}", yes_no(sync.upload)));
    if sync.upload && !sync.excludes.is_empty() {
        out.push_str(&format!(" (excluding {})", sync.excludes.join(", ")));
    }
    out.push('\n');
    out.push_str(&format!("Download:        {}\n", yes_no(sync.download)));
    out.push_str(&format!("Cache rewrite:   {}\n", yes_no(sync.rewrite_cache)));
    out.push_str(&format!("Remote cleanup:  {}\n", yes_no(sync.cleanup)));
    out.push_str(&format!("Remote command:  {}\n", plan.remote_command));
    out
}

/// `rbp config show`
pub fn config_show() -> Result<i32> {
    let loaded = load_config()?;
    match &loaded.file {
        Some(file) => println!("# Loaded from {}", file.display()),
        None => println!("# No config file found, using defaults"),
    }
    for o in &loaded.overrides {
        println!("# {} overridden by {}", o.key, o.var);
    }
    print!("{}", loaded.config.to_toml()?);
    Ok(0)
}

/// `rbp config path`
pub fn config_path() -> Result<i32> {
    let path = config::config_path().context("Could not determine config directory")?;
    println!("{}", path.display());
    Ok(0)
}

/// `rbp shims install <dir>`
pub fn shims_install(dir: &Path, force: bool) -> Result<i32> {
    let exe = std::env::current_exe().context("Failed to locate the rbp executable")?;
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    for name in [CMAKE, CONAN] {
        let shim = dir.join(name);
        if shim.symlink_metadata().is_ok() {
            if !force {
                bail!("{} already exists (use --force to replace it)", shim.display());
            }
            fs::remove_file(&shim).with_context(|| format!("Failed to remove {}", shim.display()))?;
        }
        link(&exe, &shim)?;
        println!("{} -> {}", shim.display(), exe.display());
    }
    Ok(0)
}

#[cfg(unix)]
fn link(target: &Path, shim: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, shim)
        .with_context(|| format!("Failed to create {}", shim.display()))
}

#[cfg(not(unix))]
fn link(target: &Path, shim: &Path) -> Result<()> {
    fs::hard_link(target, shim).with_context(|| format!("Failed to create {}", shim.display()))
}
