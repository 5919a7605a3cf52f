use crate::common::{TestProject, assert_contains, assert_exit_code, init_test_logging, rbp};

#[cfg(unix)]
mod shims {
    use std::fs;
    use std::path::PathBuf;
    use std::process::Command;

    use crate::common::{TestProject, assert_contains, assert_exit_code, hermetic, init_test_logging};

    fn shim(project: &TestProject, name: &str) -> PathBuf {
        let bin = project.dir.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        let link = bin.join(name);
        std::os::unix::fs::symlink(env!("CARGO_BIN_EXE_rbp"), &link).unwrap();
        link
    }

    #[test]
    fn test_conan_shim_without_source_dir_fails_before_remote() {
        init_test_logging();
        crate::test_log!("TEST START: test_conan_shim_without_source_dir_fails_before_remote");
        let project = TestProject::new();
        let conan = shim(&project, "conan");

        let output = hermetic(&mut Command::new(&conan), project.dir.path())
            .current_dir(&project.build)
            .args(["install", "no-such-dir"])
            .output()
            .unwrap();

        assert_exit_code(&output, 2);
        assert_contains(
            &String::from_utf8_lossy(&output.stderr),
            "Source directory not found in arguments: install no-such-dir",
        );
        crate::test_log!("TEST PASS: test_conan_shim_without_source_dir_fails_before_remote");
    }

    #[test]
    fn test_cmake_shim_build_without_target_fails() {
        init_test_logging();
        let project = TestProject::new();
        let cmake = shim(&project, "cmake");

        let output = hermetic(&mut Command::new(&cmake), project.dir.path())
            .current_dir(&project.source)
            .arg("--build")
            .output()
            .unwrap();

        assert_exit_code(&output, 2);
        assert_contains(
            &String::from_utf8_lossy(&output.stderr),
            "--build requires a build directory",
        );
    }
}

#[test]
fn test_run_subcommand_validates_before_connecting() {
    init_test_logging();
    let project = TestProject::new();

    let output = rbp(project.dir.path())
        .current_dir(&project.source)
        .args(["run", "--", "conan", "install", "."])
        .output()
        .unwrap();

    assert_exit_code(&output, 2);
    assert_contains(
        &String::from_utf8_lossy(&output.stderr),
        "conanfile.py or conanfile.txt does not exist",
    );
}
