use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

fn run_help(home: &TempDir, args: &[&str]) {
    let mut cmd = cargo_bin_cmd!("cipbuild");
    cmd.env("HOME", home.path())
        .args(args)
        .arg("--help")
        .assert()
        .success();
}

#[test]
fn every_cli_command_has_help_path() {
    let home = TempDir::new().expect("temp home");

    // top-level
    run_help(&home, &[]);

    run_help(&home, &["list"]);
    run_help(&home, &["active"]);
    run_help(&home, &["show"]);
    run_help(&home, &["plan"]);
    run_help(&home, &["build"]);
    run_help(&home, &["status"]);
}

#[test]
fn version_flag_reports_success() {
    let home = TempDir::new().expect("temp home");
    let mut cmd = cargo_bin_cmd!("cipbuild");
    cmd.env("HOME", home.path()).arg("--version").assert().success();
}
