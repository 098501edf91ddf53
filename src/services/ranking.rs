//! Status classification and support-window ranking.
//!
//! Joins the transient branch catalog with the schedule via the normalized
//! EOL key and produces the sorted views selection is driven from. Rows
//! never disappear on missing data; they carry explicit UNKNOWN markers.

use crate::catalog;
use crate::domain::models::{BranchRef, RankedRow, Status};
use crate::services::calendar;
use crate::services::eol::EolSchedule;

/// ACTIVE needs a known timestamp inside the threshold window; a known
/// timestamp outside it is STALE; no timestamp at all is UNKNOWN.
pub fn classify(last_commit_epoch: i64, now: i64, threshold_days: u64) -> Status {
    if last_commit_epoch <= 0 {
        return Status::Unknown;
    }
    if now - last_commit_epoch < threshold_days as i64 * 86_400 {
        Status::Active
    } else {
        Status::Stale
    }
}

/// Schedule lookup key for a branch: `MAJOR.MINOR` with the real-time
/// qualifier mapped to `-rt`. Rebase variants share their base branch's
/// row, so the `-rebase` qualifier is dropped.
pub fn eol_key(branch: &str) -> Option<String> {
    let parts = catalog::parse_branch(branch)?;
    Some(format!(
        "{}.{}{}",
        parts.major,
        parts.minor,
        if parts.rt { "-rt" } else { "" }
    ))
}

/// Tag every catalog entry once all timestamp lookups have settled. This
/// is the synchronization barrier between the fan-out fetches and ranking.
pub fn classify_all(branches: &mut [BranchRef], now: i64, threshold_days: u64) {
    for b in branches {
        b.status = classify(b.last_commit_epoch, now, threshold_days);
    }
}

/// Build the full ranked catalog: join classified branches to the schedule
/// and sort. Rows with a known EOL sort by latest EOL first; unknown-EOL
/// rows always come last; ties break on branch name ascending.
pub fn build_rows(branches: &[BranchRef], schedule: &EolSchedule, now: i64) -> Vec<RankedRow> {
    let mut rows: Vec<RankedRow> = branches
        .iter()
        .map(|b| {
            let entry = eol_key(&b.name).and_then(|k| schedule.get(&k).cloned());

            let first_release = entry
                .as_ref()
                .and_then(|e| e.first_release)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "UNKNOWN".to_string());

            let (eol, sort_epoch) = match entry.as_ref().and_then(|e| e.eol_month) {
                Some((y, m)) => {
                    let end = calendar::month_end_instant(y, m);
                    if end > 0 {
                        (format!("{:04}-{:02}", y, m), end)
                    } else {
                        ("UNKNOWN".to_string(), -1)
                    }
                }
                None => ("UNKNOWN".to_string(), -1),
            };

            let time_to_eol = if sort_epoch > now {
                calendar::calendar_diff(now, sort_epoch).to_string()
            } else if sort_epoch > 0 {
                "ended".to_string()
            } else {
                "UNKNOWN".to_string()
            };

            RankedRow {
                branch: b.name.clone(),
                sha: b.sha.clone(),
                status: b.status,
                age: calendar::describe_age(now, b.last_commit_epoch),
                first_release,
                eol,
                time_to_eol,
                sort_epoch,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.sort_epoch
            .cmp(&a.sort_epoch)
            .then_with(|| catalog::branch_order(&a.branch, &b.branch))
    });
    rows
}

/// The ACTIVE subset, in ranked order. Longest remaining support first, so
/// selection defaults to the branch with the most runway.
pub fn active_rows(rows: &[RankedRow]) -> Vec<RankedRow> {
    rows.iter()
        .filter(|r| r.status == Status::Active)
        .cloned()
        .collect()
}

/// Resolve the branch to operate on. An explicit override is matched
/// against the ACTIVE view first and falls back to the full catalog
/// (including STALE) so scripted updates are not blocked by staleness.
/// Without an override the top ACTIVE row wins; an empty ACTIVE view
/// yields no selection.
pub fn resolve_selection(
    rows: &[RankedRow],
    active: &[RankedRow],
    requested: Option<&str>,
) -> Option<String> {
    match requested {
        Some(name) => active
            .iter()
            .find(|r| r.branch == name)
            .or_else(|| rows.iter().find(|r| r.branch == name))
            .map(|r| r.branch.clone()),
        None => active.first().map(|r| r.branch.clone()),
    }
}
