//! Remote branch catalog resolution.
//!
//! Listing goes through `git ls-remote --heads`, which treats local paths
//! and URLs uniformly. Per-branch committer timestamps are a second,
//! best-effort pass: local repos answer via `git log`, remote repos via the
//! cgit atom feed. A branch whose timestamp cannot be resolved keeps the 0
//! sentinel and stays in the catalog.

use crate::domain::constants::{BRANCH_PATTERN, LIST_TIMEOUT_MS};
use crate::domain::models::{BranchRef, Status};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("branch listing failed for {repo}: {detail}")]
    ListFailed { repo: String, detail: String },
    #[error("no CIP branches found at {0}")]
    EmptyCatalog(String),
}

/// A branch name paired with its remote head commit.
#[derive(Debug, Clone)]
pub struct RemoteRef {
    pub name: String,
    pub sha: String,
}

/// Structured pieces of a versioned CIP branch name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchParts {
    pub major: u32,
    pub minor: u32,
    pub rt: bool,
    pub rebase: bool,
}

fn branch_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(BRANCH_PATTERN).expect("branch pattern compiles"))
}

pub fn parse_branch(name: &str) -> Option<BranchParts> {
    let caps = branch_regex().captures(name)?;
    Some(BranchParts {
        major: caps[1].parse().ok()?,
        minor: caps[2].parse().ok()?,
        rt: caps.get(3).is_some(),
        rebase: caps.get(4).is_some(),
    })
}

/// Artifact-family qualifier derived from the branch name.
pub fn flavor(name: &str) -> String {
    match parse_branch(name) {
        Some(p) => {
            let mut f = String::new();
            if p.rt {
                f.push_str("-rt");
            }
            if p.rebase {
                f.push_str("-rebase");
            }
            f
        }
        None => String::new(),
    }
}

/// Version-aware ordering: numeric major/minor first, then the qualifier
/// suffix so `-rt` and `-rebase` variants group beside their base branch.
pub fn branch_order(a: &str, b: &str) -> Ordering {
    match (parse_branch(a), parse_branch(b)) {
        (Some(pa), Some(pb)) => (pa.major, pa.minor, a)
            .cmp(&(pb.major, pb.minor, b)),
        _ => a.cmp(b),
    }
}

fn is_remote(source: &str) -> bool {
    source.contains("://")
}

/// Run a subprocess and collect its output, killing it when the deadline
/// passes. git has no listing timeout of its own, so an unresponsive
/// remote would otherwise stall the run indefinitely.
fn output_with_deadline(
    mut cmd: std::process::Command,
    timeout: Duration,
) -> anyhow::Result<std::process::Output> {
    use std::process::Stdio;

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn()?;
    let deadline = std::time::Instant::now() + timeout;
    loop {
        if child.try_wait()?.is_some() {
            return Ok(child.wait_with_output()?);
        }
        if std::time::Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            anyhow::bail!("timed out after {}ms", timeout.as_millis());
        }
        std::thread::sleep(Duration::from_millis(25));
    }
}

/// List matching branches from the repository. An unreachable repository,
/// a stalled listing, or an empty result set is fatal: there is no
/// candidate set to work with.
pub fn list_branches(source: &str, include_rebase: bool) -> anyhow::Result<Vec<RemoteRef>> {
    let mut cmd = std::process::Command::new("git");
    cmd.args(["ls-remote", "--heads", source]);
    let output = output_with_deadline(cmd, Duration::from_millis(LIST_TIMEOUT_MS)).map_err(
        |e| CatalogError::ListFailed {
            repo: source.to_string(),
            detail: e.to_string(),
        },
    )?;
    if !output.status.success() {
        return Err(CatalogError::ListFailed {
            repo: source.to_string(),
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }

    let listing = String::from_utf8_lossy(&output.stdout);
    let refs = filter_refs(&listing, include_rebase);
    if refs.is_empty() {
        return Err(CatalogError::EmptyCatalog(source.to_string()).into());
    }
    Ok(refs)
}

/// Pure half of the listing: parse ls-remote output, keep versioned CIP
/// branches, apply the rebase filter, dedupe, natural sort.
pub fn filter_refs(listing: &str, include_rebase: bool) -> Vec<RemoteRef> {
    let mut seen = HashSet::new();
    let mut refs = Vec::new();
    for line in listing.lines() {
        let mut fields = line.split_whitespace();
        let (Some(sha), Some(full_ref)) = (fields.next(), fields.next()) else {
            continue;
        };
        let Some(name) = full_ref.strip_prefix("refs/heads/") else {
            continue;
        };
        let Some(parts) = parse_branch(name) else {
            continue;
        };
        if parts.rebase && !include_rebase {
            continue;
        }
        if seen.insert(name.to_string()) {
            refs.push(RemoteRef {
                name: name.to_string(),
                sha: sha.to_string(),
            });
        }
    }
    refs.sort_by(|a, b| branch_order(&a.name, &b.name));
    refs
}

/// Resolve committer timestamps for every listed branch. Lookups are
/// independent read-only queries and fan out on scoped threads; all of them
/// complete (or individually degrade to 0) before this returns.
pub fn resolve_timestamps(source: &str, refs: Vec<RemoteRef>, timeout_ms: u64) -> Vec<BranchRef> {
    let remote = is_remote(source);
    let epochs: Vec<i64> = std::thread::scope(|scope| {
        let handles: Vec<_> = refs
            .iter()
            .map(|r| {
                scope.spawn(move || {
                    if remote {
                        remote_commit_epoch(source, &r.name, timeout_ms)
                    } else {
                        local_commit_epoch(source, &r.sha)
                    }
                    .unwrap_or_else(|e| {
                        tracing::warn!(branch = %r.name, error = %e, "timestamp lookup failed");
                        0
                    })
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or(0))
            .collect()
    });

    refs.into_iter()
        .zip(epochs)
        .map(|(r, epoch)| BranchRef {
            name: r.name,
            sha: r.sha,
            last_commit_epoch: epoch,
            status: Status::Unknown,
        })
        .collect()
}

fn local_commit_epoch(source: &str, sha: &str) -> anyhow::Result<i64> {
    let output = std::process::Command::new("git")
        .args(["-C", source, "log", "-1", "--format=%ct", sha])
        .output()?;
    if !output.status.success() {
        anyhow::bail!(
            "git log failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().parse()?)
}

fn remote_commit_epoch(source: &str, branch: &str, timeout_ms: u64) -> anyhow::Result<i64> {
    let url = format!("{}/atom/?h={}", source.trim_end_matches('/'), branch);
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()?;
    let body = client.get(url).send()?.error_for_status()?.text()?;
    parse_atom_updated(&body)
        .ok_or_else(|| anyhow::anyhow!("no <updated> stamp in feed for {}", branch))
}

/// First `<updated>` stamp of a cgit atom feed, as an epoch.
pub fn parse_atom_updated(body: &str) -> Option<i64> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"<updated>([^<]+)</updated>").expect("atom pattern compiles")
    });
    let stamp = re.captures(body)?.get(1)?.as_str().trim().to_string();
    chrono::DateTime::parse_from_rfc3339(&stamp)
        .ok()
        .map(|dt| dt.timestamp())
}

/// Ensure git itself is available; the tool cannot do anything without it.
pub fn require_git() -> anyhow::Result<()> {
    let ok = std::process::Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    if !ok {
        anyhow::bail!("required tool missing: git");
    }
    Ok(())
}

/// True when the repository working tree looks usable for an incremental
/// build (a kernel tree has a top-level Makefile).
pub fn source_tree_intact(dir: &Path) -> bool {
    dir.join(".git").exists() && dir.join("Makefile").exists()
}
