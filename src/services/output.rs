//! Rendering for the two output surfaces: human tab-separated lines on
//! stdout, or the `{ok, data}` JSON envelope when `--json` is set.

use crate::domain::models::{JsonOut, RankedRow};
use serde::Serialize;
use std::io::Write;

/// One ranked branch as a tab-separated line. Degraded fields arrive
/// already rendered (UNKNOWN / "unknown") and pass through unchanged, so
/// a run without schedule data still prints every column.
pub fn ranked_line(r: &RankedRow) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}",
        r.branch, r.status, r.age, r.eol, r.time_to_eol
    )
}

fn emit_json<T: Serialize>(data: T) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &JsonOut { ok: true, data })?;
    writeln!(out)?;
    Ok(())
}

pub fn emit_rows<T: Serialize>(
    json: bool,
    rows: &[T],
    line: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        return emit_json(rows);
    }
    for r in rows {
        println!("{}", line(r));
    }
    Ok(())
}

pub fn emit_one<T: Serialize>(
    json: bool,
    data: T,
    line: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        return emit_json(&data);
    }
    println!("{}", line(&data));
    Ok(())
}
