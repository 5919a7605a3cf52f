use crate::common::{TestProject, assert_contains, assert_exit_code, init_test_logging, rbp};

#[test]
fn test_classify_version_probe() {
    init_test_logging();
    crate::test_log!("TEST START: test_classify_version_probe");
    let project = TestProject::new();

    let output = rbp(project.dir.path())
        .args(["classify", "--", "cmake", "--version"])
        .output()
        .unwrap();

    assert_exit_code(&output, 0);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_contains(&stdout, "cmake (version probe)");
    assert_contains(&stdout, "Upload:          no");
    assert_contains(&stdout, "Remote command:  cmake --version");
    crate::test_log!("TEST PASS: test_classify_version_probe");
}

#[test]
fn test_classify_generate_maps_into_mirror() {
    init_test_logging();
    let project = TestProject::new().with_cmake_lists();

    let output = rbp(project.dir.path())
        .current_dir(&project.build)
        .args(["classify", "--", "cmake", "-DCMAKE_BUILD_TYPE=Release", ".."])
        .output()
        .unwrap();

    assert_exit_code(&output, 0);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let remote_source = format!("/mnt/remote{}", project.source.display());
    assert_contains(&stdout, "cmake (generate)");
    assert_contains(&stdout, &format!("Remote source:   {remote_source}"));
    assert_contains(&stdout, "Upload:          yes (excluding .git, build)");
    assert_contains(&stdout, "-DCMAKE_BUILD_TYPE=Release");
    assert_contains(&stdout, &format!("-DCMAKE_MAKE_PROGRAM=make -DCMAKE_BUILD_TYPE=Release {remote_source}\n"));
}

#[test]
fn test_classify_build_only_skips_upload() {
    init_test_logging();
    let project = TestProject::new();

    let output = rbp(project.dir.path())
        .current_dir(&project.source)
        .args(["classify", "--json", "--", "cmake", "--build", "build"])
        .output()
        .unwrap();

    assert_exit_code(&output, 0);
    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["command"]["tool"], "build_tool");
    assert_eq!(plan["command"]["mode"], "build_only");
    assert_eq!(plan["sync"]["upload"], false);
    assert_eq!(plan["sync"]["download"], true);
    assert_eq!(plan["paths"]["workdir"], "/tmp/rbp-proj");
    let steps = plan["remote_command"]["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 2);
    assert!(steps[1].as_str().unwrap().ends_with("--target install"));
}

#[test]
fn test_classify_unknown_tool_exits_with_usage_code() {
    init_test_logging();
    let project = TestProject::new();

    let output = rbp(project.dir.path())
        .args(["classify", "make", "all"])
        .output()
        .unwrap();

    assert_exit_code(&output, 2);
    assert_contains(
        &String::from_utf8_lossy(&output.stderr),
        "Unknown command [make], use conan or cmake",
    );
}

#[test]
fn test_classify_generate_without_cmake_lists_fails() {
    init_test_logging();
    let project = TestProject::new();

    let output = rbp(project.dir.path())
        .current_dir(&project.build)
        .args(["classify", "cmake", ".."])
        .output()
        .unwrap();

    assert_exit_code(&output, 2);
    assert_contains(&String::from_utf8_lossy(&output.stderr), "CMakeLists.txt does not exist");
}

#[test]
fn test_classify_conan_install_sets_package_home() {
    init_test_logging();
    let project = TestProject::new().with_conanfile();

    let output = rbp(project.dir.path())
        .current_dir(&project.build)
        .args(["classify", "--", "conan", "install", "..", "--build=missing"])
        .output()
        .unwrap();

    assert_exit_code(&output, 0);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_contains(&stdout, "conan (install)");
    assert_contains(
        &stdout,
        &format!("CONAN_USER_HOME=/mnt/remote{}", project.dir.path().display()),
    );
    assert_contains(
        &stdout,
        &format!("install /mnt/remote{} --build=missing", project.source.display()),
    );
}
