use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Serialize)]
pub struct JsonOut<T: Serialize> {
    pub ok: bool,
    pub data: T,
}

/// Recency classification of a branch relative to the activity threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Active,
    Stale,
    Unknown,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Active => "ACTIVE",
            Status::Stale => "STALE",
            Status::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// One remote branch as seen this run. Transient, recomputed every invocation.
#[derive(Debug, Clone)]
pub struct BranchRef {
    pub name: String,
    /// Remote head commit, from the ls-remote listing.
    pub sha: String,
    /// Committer timestamp of the head commit; 0 = unknown.
    pub last_commit_epoch: i64,
    pub status: Status,
}

/// One row of the support schedule. Both facts are independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EolEntry {
    pub first_release: Option<NaiveDate>,
    /// (year, month) after which support ends.
    pub eol_month: Option<(i32, u32)>,
}

/// Presentation-ready join of a BranchRef with its schedule entry.
#[derive(Debug, Clone, Serialize)]
pub struct RankedRow {
    pub branch: String,
    pub sha: String,
    pub status: Status,
    pub age: String,
    pub first_release: String,
    pub eol: String,
    pub time_to_eol: String,
    /// Last instant of the EOL month, or -1 when unknown. Unknown rows
    /// always sort after known ones.
    pub sort_epoch: i64,
}

/// Durable per-branch record, written only after a successful build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub branch: String,
    pub kernel_version: String,
    pub commit: String,
    pub built_at_epoch: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    Absent,
    Fresh,
    Built,
    StaleSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildAction {
    FullClone,
    Incremental,
    UpdateIncremental,
}

/// What the external pipeline is asked to do for one branch.
#[derive(Debug, Clone, Serialize)]
pub struct BuildPlan {
    pub branch: String,
    pub flavor: String,
    pub action: BuildAction,
    pub clean: bool,
    pub source_dir: PathBuf,
    pub saved_config: Option<PathBuf>,
    pub use_ccache: bool,
    pub localmodconfig: bool,
    pub debug_symbols: bool,
}

/// What the pipeline reports back on success.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub kernel_version: String,
    pub commit: String,
}

#[derive(Serialize)]
pub struct BuildReport {
    pub branch: String,
    pub action: BuildAction,
    pub kernel_version: String,
    pub commit: String,
}

#[derive(Serialize)]
pub struct ShowReport {
    pub row: RankedRow,
    pub cache_state: CacheState,
}

#[derive(Serialize)]
pub struct StatusRow {
    pub branch: String,
    pub state: CacheState,
    pub kernel_version: Option<String>,
    pub commit: Option<String>,
    pub built_at_epoch: Option<i64>,
    pub source_tree_present: bool,
    pub saved_config_present: bool,
}
