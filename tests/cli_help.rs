use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn cli_help_runs() {
    let mut cmd = Command::cargo_bin("bag2csv").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--orig"))
        .stdout(predicate::str::contains("--dest"));
}

#[test]
fn cli_version_is_semver_like() {
    let mut cmd = Command::cargo_bin("bag2csv").unwrap();
    let output = cmd.arg("--version").output().unwrap();
    assert!(output.status.success());
    let ver = env!("CARGO_PKG_VERSION");
    assert!(ver.split('.').count() >= 2);
    assert!(String::from_utf8_lossy(&output.stdout).contains(ver));
}

#[test]
fn missing_bag_exits_non_zero() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("bag2csv").unwrap();
    cmd.args(["-orig", "no_such_file.bag", "-dest"])
        .arg(dir.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open bag"));
}

#[test]
fn missing_dest_is_a_usage_error() {
    let mut cmd = Command::cargo_bin("bag2csv").unwrap();
    cmd.args(["-orig", "in.bag"]).assert().failure();
}

#[test]
fn validate_nonexistent_file_fails() {
    let mut cmd = Command::cargo_bin("bag2csv").unwrap();
    cmd.args(["validate", "nonexistent.csv"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("FAILED"));
}

#[test]
fn validate_generated_shape_passes() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("odom_generated.csv");
    std::fs::write(&path, "header.seq,twist.linear.x\n0,0.5\n1,0.25\n").unwrap();

    let mut cmd = Command::cargo_bin("bag2csv").unwrap();
    cmd.arg("validate")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("PASSED"))
        .stdout(predicate::str::contains("Columns: 2, Rows: 2"));
}
