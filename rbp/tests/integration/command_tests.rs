use std::fs;
use std::process::Command;

use tempfile::TempDir;

use crate::common::{assert_contains, assert_exit_code, init_test_logging, rbp};

#[test]
fn test_rbp_help_includes_description() {
    init_test_logging();
    crate::test_log!("TEST START: test_rbp_help_includes_description");

    let output = Command::new(env!("CARGO_BIN_EXE_rbp"))
        .arg("--help")
        .output()
        .expect("Failed to run rbp --help");

    assert!(output.status.success(), "rbp --help failed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_contains(&stdout, "Remote Build Proxy");
    assert_contains(&stdout, "classify");

    crate::test_log!("TEST PASS: test_rbp_help_includes_description");
}

#[test]
fn test_config_path_follows_env() {
    init_test_logging();
    let tmp = TempDir::new().unwrap();

    let output = rbp(tmp.path()).args(["config", "path"]).output().unwrap();

    assert_exit_code(&output, 0);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), tmp.path().join("config.toml").display().to_string());
}

#[test]
fn test_config_show_reports_file_and_overrides() {
    init_test_logging();
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("config.toml"),
        "[remote]\nhost = \"builder.lan\"\n\n[toolchain]\ncc = \"/opt/gcc/bin/gcc\"\n",
    )
    .unwrap();

    let output = rbp(tmp.path()).args(["config", "show"]).output().unwrap();

    assert_exit_code(&output, 0);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_contains(&stdout, "# Loaded from");
    assert_contains(&stdout, "host = \"builder.lan\"");
    assert_contains(&stdout, "cc = \"/opt/gcc/bin/gcc\"");
    assert_contains(&stdout, "# remote.remote_dir overridden by RBP_REMOTE_DIR");
}

#[test]
fn test_invalid_config_exits_with_usage_code() {
    init_test_logging();
    let tmp = TempDir::new().unwrap();

    let output = rbp(tmp.path())
        .env("RBP_PORT", "not-a-port")
        .args(["config", "show"])
        .output()
        .unwrap();

    assert_exit_code(&output, 2);
    assert_contains(&String::from_utf8_lossy(&output.stderr), "RBP_PORT");
}

#[cfg(unix)]
#[test]
fn test_shims_install_links_both_tools() {
    init_test_logging();
    let tmp = TempDir::new().unwrap();
    let bin = tmp.path().join("bin");

    let output = rbp(tmp.path())
        .args(["shims", "install"])
        .arg(&bin)
        .output()
        .unwrap();

    assert_exit_code(&output, 0);
    for name in ["cmake", "conan"] {
        let target = fs::read_link(bin.join(name)).unwrap();
        assert_eq!(target.file_name().unwrap(), "rbp");
    }

    let again = rbp(tmp.path())
        .args(["shims", "install"])
        .arg(&bin)
        .output()
        .unwrap();
    assert_exit_code(&again, 1);
    assert_contains(&String::from_utf8_lossy(&again.stderr), "--force");
}
