//! Per-branch build cache: durable records, plan decisions, advisory lock.
//!
//! Layout, per branch key (any character outside `[A-Za-z0-9._-]` replaced
//! by `-`):
//!
//! ```text
//! <config_cache_dir>/<key>/record.json      last successful build facts
//! <config_cache_dir>/<key>/saved.config     snapshot of the resolved .config
//! <config_cache_dir>/<key>/.build_complete  completion marker
//! <config_cache_dir>/<key>/.lock            advisory per-branch lock (PID)
//! <build_cache_dir>/<key>/                  kernel source tree
//! ```
//!
//! Records are the only durable state and are written atomically
//! (temp-then-rename), so an interrupted run leaves the last committed
//! record intact. Entries are operator-owned and never deleted here.

use crate::catalog;
use crate::cli::Config;
use crate::domain::models::{BuildAction, BuildOutcome, BuildPlan, CacheRecord, CacheState};
use std::path::{Path, PathBuf};

/// Filesystem-safe encoding of a branch name.
pub fn branch_key(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Handle on one branch's cache entry. Construction does no IO.
pub struct BranchCache {
    pub branch: String,
    pub entry_dir: PathBuf,
    pub source_dir: PathBuf,
}

impl BranchCache {
    pub fn open(cfg: &Config, branch: &str) -> Self {
        let key = branch_key(branch);
        Self {
            branch: branch.to_string(),
            entry_dir: cfg.config_cache_dir.join(&key),
            source_dir: cfg.build_cache_dir.join(&key),
        }
    }

    fn record_path(&self) -> PathBuf {
        self.entry_dir.join("record.json")
    }

    fn config_path(&self) -> PathBuf {
        self.entry_dir.join("saved.config")
    }

    fn marker_path(&self) -> PathBuf {
        self.entry_dir.join(".build_complete")
    }

    /// ABSENT -> FRESH: first encounter creates the entry and source dirs
    /// with an empty state.
    pub fn ensure_dirs(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.entry_dir)?;
        std::fs::create_dir_all(&self.source_dir)?;
        Ok(())
    }

    /// Last committed record, if any. A malformed record is reported and
    /// treated as absent rather than trusted or executed.
    pub fn record(&self) -> Option<CacheRecord> {
        let raw = std::fs::read_to_string(self.record_path()).ok()?;
        match serde_json::from_str(&raw) {
            Ok(rec) => Some(rec),
            Err(e) => {
                tracing::warn!(branch = %self.branch, error = %e, "ignoring malformed cache record");
                None
            }
        }
    }

    pub fn saved_config(&self) -> Option<PathBuf> {
        let p = self.config_path();
        p.exists().then_some(p)
    }

    pub fn build_completed(&self) -> bool {
        self.marker_path().exists()
    }

    pub fn source_tree_present(&self) -> bool {
        catalog::source_tree_intact(&self.source_dir)
    }

    /// Where this entry sits in the lifecycle. `remote_sha` of `None` skips
    /// the staleness comparison (offline views).
    pub fn state(&self, remote_sha: Option<&str>) -> CacheState {
        if !self.entry_dir.exists() {
            return CacheState::Absent;
        }
        let Some(rec) = self.record() else {
            return CacheState::Fresh;
        };
        if let Some(sha) = remote_sha {
            if !sha.is_empty() && sha != rec.commit {
                return CacheState::StaleSource;
            }
        }
        CacheState::Built
    }

    /// Decide how the next build should run. A missing or broken source
    /// tree forces the full-clone path regardless of recorded state; a
    /// stale recorded commit over an intact tree gets update-then-
    /// incremental; clean is forced whenever no completion marker exists
    /// or incremental mode is disabled.
    pub fn plan(&self, remote_sha: &str, cfg: &Config) -> BuildPlan {
        let state = self.state(Some(remote_sha));
        let action = if !self.source_tree_present() {
            BuildAction::FullClone
        } else if state == CacheState::StaleSource {
            BuildAction::UpdateIncremental
        } else {
            BuildAction::Incremental
        };
        let clean = action == BuildAction::FullClone
            || !self.build_completed()
            || !cfg.incremental;

        BuildPlan {
            branch: self.branch.clone(),
            flavor: catalog::flavor(&self.branch),
            action,
            clean,
            source_dir: self.source_dir.clone(),
            saved_config: self.saved_config(),
            use_ccache: cfg.use_ccache,
            localmodconfig: cfg.localmodconfig,
            debug_symbols: cfg.debug_symbols,
        }
    }

    /// FRESH/BUILT -> BUILT: commit a successful build. Snapshots the
    /// resolved configuration out of the tree before the atomic record
    /// write, and drops the completion marker last.
    pub fn commit_success(&self, outcome: &BuildOutcome, now: i64) -> anyhow::Result<()> {
        let resolved = self.source_dir.join(".config");
        if resolved.exists() {
            std::fs::copy(&resolved, self.config_path())?;
        }

        let record = CacheRecord {
            branch: self.branch.clone(),
            kernel_version: outcome.kernel_version.clone(),
            commit: outcome.commit.clone(),
            built_at_epoch: now,
        };
        write_atomic(
            &self.record_path(),
            serde_json::to_string_pretty(&record)?.as_bytes(),
        )?;
        std::fs::write(self.marker_path(), b"")?;

        audit(
            "build_complete",
            serde_json::json!({
                "branch": record.branch,
                "kernel_version": record.kernel_version,
                "commit": record.commit,
            }),
        );
        Ok(())
    }

    /// Advisory per-branch lock. Same-branch invocations are refused while
    /// the holder is alive; a lock left by a dead process is replaced.
    pub fn lock(&self) -> anyhow::Result<CacheLock> {
        self.ensure_dirs()?;
        CacheLock::acquire(self.entry_dir.join(".lock"), &self.branch)
    }
}

/// Every persisted cache entry, for the offline status view.
pub fn all_entries(cfg: &Config) -> anyhow::Result<Vec<BranchCache>> {
    let mut out = Vec::new();
    let root = &cfg.config_cache_dir;
    if !root.exists() {
        return Ok(out);
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort_by(|a, b| catalog::branch_order(a, b));
    for name in names {
        // Keys are sanitized branch names; CIP branch names survive the
        // sanitizer unchanged, so the key is the branch.
        out.push(BranchCache::open(cfg, &name));
    }
    Ok(out)
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

pub struct CacheLock {
    path: PathBuf,
}

impl CacheLock {
    fn acquire(path: PathBuf, branch: &str) -> anyhow::Result<Self> {
        for _ in 0..2 {
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(mut f) => {
                    use std::io::Write;
                    writeln!(f, "{}", std::process::id())?;
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    let holder: Option<u32> = std::fs::read_to_string(&path)
                        .ok()
                        .and_then(|s| s.trim().parse().ok());
                    match holder {
                        Some(pid) if pid_alive(pid) => {
                            anyhow::bail!("branch {} busy: locked by pid {}", branch, pid)
                        }
                        _ => {
                            tracing::warn!(%branch, "replacing stale build lock");
                            let _ = std::fs::remove_file(&path);
                        }
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        anyhow::bail!("could not acquire build lock for {}", branch)
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn pid_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

/// Append-only build event log under the user's state dir.
pub fn audit(action: &str, data: serde_json::Value) {
    let home = match std::env::var("HOME") {
        Ok(h) => h,
        Err(_) => return,
    };
    let path = PathBuf::from(home).join(".local/state/cipbuild/audit.jsonl");
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let event = serde_json::json!({
        "ts": ts,
        "action": action,
        "data": data
    });
    let line = format!("{}\n", event);
    let _ = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut f| std::io::Write::write_all(&mut f, line.as_bytes()));
}
