//! Gateway to the external build/package/install pipeline.
//!
//! The pipeline is opaque: it receives the chosen branch, the source tree
//! location and the plan, performs clone/fetch/checkout, build, packaging,
//! install and boot registration itself, and reports the resolved kernel
//! version and source commit on stdout. This module never interprets its
//! internals beyond that contract.

use crate::domain::models::{BuildOutcome, BuildPlan};
use std::path::Path;

pub trait BuildPipeline {
    fn run(&self, repo: &str, plan: &BuildPlan) -> anyhow::Result<BuildOutcome>;
}

/// Subprocess-backed pipeline. Invoked as:
///
/// ```text
/// <build_cmd> <branch> <source-tree-dir>
/// ```
///
/// with the plan carried in `CIPBUILD_*` environment variables, and
/// expected to print `KERNELVERSION=<str>` and `COMMIT=<sha>` lines.
pub struct ProcessPipeline {
    pub build_cmd: String,
    pub ccache_dir: std::path::PathBuf,
}

impl BuildPipeline for ProcessPipeline {
    fn run(&self, repo: &str, plan: &BuildPlan) -> anyhow::Result<BuildOutcome> {
        tracing::info!(branch = %plan.branch, action = ?plan.action, "invoking build pipeline");
        let mut cmd = std::process::Command::new(&self.build_cmd);
        cmd.arg(&plan.branch)
            .arg(&plan.source_dir)
            .env("CIPBUILD_REPO", repo)
            .env("CIPBUILD_FLAVOR", &plan.flavor)
            .env("CIPBUILD_CLEAN", bool_env(plan.clean))
            .env("CIPBUILD_CCACHE_DIR", &self.ccache_dir)
            .env("CIPBUILD_USE_CCACHE", bool_env(plan.use_ccache))
            .env("CIPBUILD_LOCALMODCONFIG", bool_env(plan.localmodconfig))
            .env("CIPBUILD_DEBUG_SYMBOLS", bool_env(plan.debug_symbols));
        if let Some(saved) = &plan.saved_config {
            cmd.env("CIPBUILD_SAVED_CONFIG", saved);
        }

        let output = cmd.output().map_err(|e| {
            anyhow::anyhow!("failed to launch builder {}: {}", self.build_cmd, e)
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "build pipeline failed for {} ({}): {}",
                plan.branch,
                output.status,
                stderr.lines().last().unwrap_or("no output").trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_outcome(&stdout).ok_or_else(|| {
            anyhow::anyhow!(
                "build pipeline for {} reported no KERNELVERSION/COMMIT",
                plan.branch
            )
        })
    }
}

fn bool_env(v: bool) -> &'static str {
    if v {
        "1"
    } else {
        "0"
    }
}

/// Extract the outcome keys the pipeline contract promises.
pub fn parse_outcome(stdout: &str) -> Option<BuildOutcome> {
    let mut kernel_version = None;
    let mut commit = None;
    for line in stdout.lines() {
        let line = line.trim();
        if let Some(v) = line.strip_prefix("KERNELVERSION=") {
            kernel_version = Some(v.trim().to_string());
        } else if let Some(v) = line.strip_prefix("COMMIT=") {
            commit = Some(v.trim().to_string());
        }
    }
    match (kernel_version, commit) {
        (Some(kernel_version), Some(commit)) if !kernel_version.is_empty() && !commit.is_empty() => {
            Some(BuildOutcome {
                kernel_version,
                commit,
            })
        }
        _ => None,
    }
}

/// Fatal preconditions checked before any build side effect: the builder
/// must be resolvable, the boot hook installed, and the tool must not run
/// with root privileges (the pipeline escalates only for its install step).
pub fn preflight(build_cmd: &str, boot_hook: &Path, allow_root: bool) -> anyhow::Result<()> {
    if !command_resolvable(build_cmd) {
        anyhow::bail!("required tool missing: {}", build_cmd);
    }
    if !boot_hook.exists() {
        anyhow::bail!(
            "boot registration hook not installed: {}",
            boot_hook.display()
        );
    }
    if !allow_root && effective_uid_is_root() {
        anyhow::bail!("refusing to run a build as root; the pipeline escalates when installing");
    }
    Ok(())
}

fn command_resolvable(cmd: &str) -> bool {
    let p = Path::new(cmd);
    if p.components().count() > 1 {
        return p.exists();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(cmd).exists()))
        .unwrap_or(false)
}

fn effective_uid_is_root() -> bool {
    std::process::Command::new("id")
        .arg("-u")
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).trim() == "0")
        .unwrap_or(false)
}
