//! Support-schedule acquisition and parsing.
//!
//! The schedule is a wiki page containing pipe-delimited rows per SLTS
//! version. Fetching it is best-effort: a run with no schedule still
//! produces a complete table, with every EOL field marked UNKNOWN.

use crate::domain::constants::{FETCH_TIMEOUT_MS, SLTS_LABEL_PATTERN};
use crate::domain::models::EolEntry;
use chrono::NaiveDate;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

/// Version-keyed support data, e.g. `"6.1"` or `"6.1-rt"`.
#[derive(Debug, Default, Clone)]
pub struct EolSchedule {
    entries: BTreeMap<String, EolEntry>,
}

impl EolSchedule {
    pub fn get(&self, key: &str) -> Option<&EolEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(SLTS_LABEL_PATTERN).expect("SLTS label pattern compiles"))
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

fn cache_path(source: &str) -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")?;
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    let id = hex::encode(hasher.finalize());
    Ok(PathBuf::from(home)
        .join(".cache")
        .join("cipbuild")
        .join("schedules")
        .join(format!("{}.txt", id)))
}

fn fetch_schedule_text(source: &str, timeout_ms: u64) -> anyhow::Result<String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()?;
    let resp = client.get(source).send()?.error_for_status()?;
    Ok(resp.text()?)
}

/// Load the schedule from a URL or a local file. Remote fetches fall back
/// to the last cached copy; total failure degrades to an empty schedule.
pub fn load_schedule(source: &str) -> EolSchedule {
    let text = if is_remote(source) {
        match fetch_schedule_text(source, FETCH_TIMEOUT_MS) {
            Ok(body) => {
                if let Ok(cache) = cache_path(source) {
                    if let Some(parent) = cache.parent() {
                        let _ = std::fs::create_dir_all(parent);
                    }
                    // Temp-then-rename: an interrupted run must not leave a
                    // truncated copy for a later degraded run to trust.
                    let _ = crate::services::cache::write_atomic(&cache, body.as_bytes());
                }
                Some(body)
            }
            Err(e) => {
                let cached = cache_path(source)
                    .ok()
                    .filter(|p| p.exists())
                    .and_then(|p| std::fs::read_to_string(p).ok());
                if cached.is_some() {
                    tracing::warn!(%source, error = %e, "schedule fetch failed, using cached copy");
                } else {
                    tracing::warn!(%source, error = %e, "schedule unavailable, EOL data unknown");
                }
                cached
            }
        }
    } else {
        match std::fs::read_to_string(source) {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::warn!(%source, error = %e, "schedule unreadable, EOL data unknown");
                None
            }
        }
    };

    match text {
        Some(t) => parse_schedule(&t),
        None => EolSchedule::default(),
    }
}

/// Extract SLTS rows from pipe-delimited table text. Malformed date cells
/// are dropped per-row; first-release and EOL are independent facts.
pub fn parse_schedule(text: &str) -> EolSchedule {
    let mut entries: BTreeMap<String, EolEntry> = BTreeMap::new();

    for line in text.lines() {
        let line = line.trim();
        if !line.starts_with('|') {
            continue;
        }
        let cells: Vec<&str> = line
            .split('|')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();
        let Some(label) = cells.first() else {
            continue;
        };
        let Some(caps) = label_regex().captures(label) else {
            continue;
        };
        let key = format!(
            "{}.{}{}",
            &caps[1],
            &caps[2],
            if caps.get(3).is_some() { "-rt" } else { "" }
        );

        let entry = entries.entry(key).or_default();
        for cell in &cells[1..] {
            if entry.first_release.is_none() {
                if let Some(d) = parse_full_date(cell) {
                    entry.first_release = Some(d);
                    continue;
                }
            }
            if entry.eol_month.is_none() {
                if let Some(ym) = parse_year_month(cell) {
                    entry.eol_month = Some(ym);
                }
            }
        }
    }

    EolSchedule { entries }
}

fn parse_full_date(cell: &str) -> Option<NaiveDate> {
    if cell.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(cell, "%Y-%m-%d").ok()
}

fn parse_year_month(cell: &str) -> Option<(i32, u32)> {
    let (y, m) = cell.split_once('-')?;
    if y.len() != 4 || m.len() != 2 {
        return None;
    }
    let year: i32 = y.parse().ok()?;
    let month: u32 = m.parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }
    Some((year, month))
}

#[cfg(test)]
mod tests {
    use super::parse_schedule;
    use chrono::NaiveDate;

    #[test]
    fn slts_rows_yield_both_dates() {
        let text = "\
^ Version ^ Maintainer ^ First release ^ Projected EOL ^ Notes ^
| SLTS v6.1 | Iwamatsu-san | 2023-07-14 | 2033-08 | |
| SLTS v6.1-rt | Kiszka-san | 2023-07-14 | 2033-08 | |
| mainline | - | 2024-01-01 | 2024-12 | not a tier |
";
        let s = parse_schedule(text);
        assert_eq!(s.len(), 2);
        let entry = s.get("6.1").expect("6.1 present");
        assert_eq!(
            entry.first_release,
            NaiveDate::from_ymd_opt(2023, 7, 14)
        );
        assert_eq!(entry.eol_month, Some((2033, 8)));
        assert!(s.get("6.1-rt").is_some());
        assert!(s.get("2024").is_none());
    }

    #[test]
    fn malformed_cell_drops_only_that_fact() {
        let text = "| SLTS v4.4 | x | 2017-13-40 | 2027-01 | |";
        let s = parse_schedule(text);
        let entry = s.get("4.4").expect("4.4 present");
        assert_eq!(entry.first_release, None);
        assert_eq!(entry.eol_month, Some((2027, 1)));
    }

    #[test]
    fn year_month_validation_is_strict() {
        let text = "\
| SLTS v5.10 | x | 2020-12-21 | 2027-13 | |
| SLTS v4.19 | x | 18-10-22 | 2029-1 | |
";
        let s = parse_schedule(text);
        assert_eq!(s.get("5.10").expect("row kept").eol_month, None);
        let v419 = s.get("4.19").expect("row kept");
        assert_eq!(v419.first_release, None);
        assert_eq!(v419.eol_month, None);
    }

    #[test]
    fn non_table_lines_are_ignored() {
        let s = parse_schedule("SLTS v6.1 prose mention 2033-08\n\nplain text\n");
        assert!(s.is_empty());
    }

    #[test]
    fn whitespace_around_cells_is_trimmed() {
        let s = parse_schedule("|   SLTS v6.6  |  2025-01-10   |   2035-01  |");
        let entry = s.get("6.6").expect("6.6 present");
        assert_eq!(entry.first_release, NaiveDate::from_ymd_opt(2025, 1, 10));
        assert_eq!(entry.eol_month, Some((2035, 1)));
    }
}
