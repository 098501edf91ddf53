use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use chrono::Utc;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestEnv {
    pub _tmp: TempDir,
    pub home: PathBuf,
    pub repo: PathBuf,
    pub schedule: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let home = tmp.path().join("home");
        fs::create_dir_all(&home).expect("create isolated home");

        let repo = make_fixture_repo(tmp.path());
        let schedule = make_fixture_schedule(tmp.path());

        Self {
            _tmp: tmp,
            home,
            repo,
            schedule,
        }
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("cipbuild");
        cmd.env("HOME", &self.home)
            .env("CIPBUILD_REPO", &self.repo)
            .env("CIPBUILD_SCHEDULE", &self.schedule);
        cmd
    }

    pub fn run_json(&self, args: &[&str]) -> Value {
        let mut cmd = self.cmd();
        let out = cmd
            .arg("--json")
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&out).expect("valid json output")
    }

    /// Branch names of a `data` array, in order.
    pub fn branch_names(v: &Value) -> Vec<String> {
        v["data"]
            .as_array()
            .expect("data array")
            .iter()
            .map(|r| r["branch"].as_str().expect("branch field").to_string())
            .collect()
    }

    /// Stub builder honoring the pipeline contract: creates an intact
    /// source tree, writes a resolved .config, and reports version/commit.
    pub fn install_fake_builder(&self, kernel_version: &str, exit_code: i32) -> PathBuf {
        let script = self._tmp.path().join("fake-build");
        let body = format!(
            "#!/bin/sh\n\
             set -e\n\
             branch=\"$1\"\n\
             tree=\"$2\"\n\
             mkdir -p \"$tree/.git\"\n\
             touch \"$tree/Makefile\"\n\
             echo 'CONFIG_LOCALVERSION=\"-cip\"' > \"$tree/.config\"\n\
             echo \"KERNELVERSION={kernel_version}\"\n\
             echo \"COMMIT=$(git ls-remote {repo} \"refs/heads/$branch\" | cut -f1)\"\n\
             exit {exit_code}\n",
            kernel_version = kernel_version,
            repo = self.repo.display(),
            exit_code = exit_code,
        );
        fs::write(&script, body).expect("write builder stub");
        make_executable(&script);

        let hook = self._tmp.path().join("boot-hook");
        fs::write(&hook, "#!/bin/sh\nexit 0\n").expect("write boot hook");
        make_executable(&hook);

        script
    }

    pub fn build_cmd(&self, builder: &Path, args: &[&str]) -> Command {
        let mut cmd = self.cmd();
        cmd.env("CIPBUILD_BUILD_CMD", builder)
            .env("CIPBUILD_BOOT_HOOK", self._tmp.path().join("boot-hook"))
            .env("CIPBUILD_ALLOW_ROOT", "1")
            .arg("--json")
            .args(args);
        cmd
    }

    pub fn commit_on_branch(&self, branch: &str, age_days: i64) {
        git(&self.repo, Some(age_days), &["checkout", "-q", branch]);
        git(
            &self.repo,
            Some(age_days),
            &["commit", "-q", "--allow-empty", "-m", "tick"],
        );
        git(&self.repo, None, &["checkout", "-q", "main"]);
    }
}

fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path).expect("stat script").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod script");
}

fn git(repo: &Path, age_days: Option<i64>, args: &[&str]) {
    let mut cmd = std::process::Command::new("git");
    cmd.current_dir(repo)
        .args(args)
        .env("GIT_AUTHOR_NAME", "Fixture")
        .env("GIT_AUTHOR_EMAIL", "fixture@example.com")
        .env("GIT_COMMITTER_NAME", "Fixture")
        .env("GIT_COMMITTER_EMAIL", "fixture@example.com");
    if let Some(days) = age_days {
        // git accepts the raw "<epoch> <offset>" internal date format
        let stamp = format!("{} +0000", Utc::now().timestamp() - days * 86_400);
        cmd.env("GIT_AUTHOR_DATE", &stamp)
            .env("GIT_COMMITTER_DATE", &stamp);
    }
    let out = cmd.output().expect("run git");
    assert!(
        out.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
}

fn branch_with_commit(repo: &Path, name: &str, age_days: i64) {
    git(repo, None, &["checkout", "-q", "-b", name, "main"]);
    git(
        repo,
        Some(age_days),
        &["commit", "-q", "--allow-empty", "-m", name],
    );
}

fn make_fixture_repo(base: &Path) -> PathBuf {
    let repo = base.join("linux-cip");
    fs::create_dir_all(&repo).expect("create repo dir");
    git(&repo, None, &["init", "-q", "-b", "main"]);
    fs::write(repo.join("Makefile"), "VERSION = 6\n").expect("write makefile");
    git(&repo, Some(500), &["add", "Makefile"]);
    git(&repo, Some(500), &["commit", "-q", "-m", "base"]);

    branch_with_commit(&repo, "linux-4.4.y-cip", 400);
    branch_with_commit(&repo, "linux-6.1.y-cip", 5);
    branch_with_commit(&repo, "linux-6.1.y-cip-rt", 10);
    branch_with_commit(&repo, "linux-6.6.y-cip-rebase", 3);
    git(&repo, None, &["checkout", "-q", "main"]);
    repo
}

fn make_fixture_schedule(base: &Path) -> PathBuf {
    let path = base.join("schedule.txt");
    fs::write(
        &path,
        "\
^ Version ^ Maintainer ^ First release ^ Projected EOL ^ Notes ^
| SLTS v4.4 | A | 2017-01-17 | 2027-01 | |
| SLTS v6.1 | B | 2023-07-14 | 2033-08 | |
| SLTS v6.1-rt | C | 2023-07-14 | 2033-08 | |
| SLTS v6.6 | D | 2025-01-10 | 2035-01 | |
",
    )
    .expect("write schedule");
    path
}
