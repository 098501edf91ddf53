//! Service layer containing business logic and side-effect helpers.
//!
//! ## Service map
//! - `eol.rs` — support-schedule fetch + pipe-table parsing.
//! - `calendar.rs` — month-end instants and anchored calendar diffs.
//! - `ranking.rs` — ACTIVE/STALE classification, schedule join, sorted views.
//! - `cache.rs` — per-branch build cache, plan decisions, lock, audit log.
//! - `pipeline.rs` — external build pipeline gateway + preflight checks.
//! - `output.rs` — JSON/text output helpers.
//!
//! ## Conventions
//! - Prefer pure helpers where possible.
//! - Side effects should be explicit and localized.
//! - Keep command handlers thin; delegate to services.

pub mod cache;
pub mod calendar;
pub mod eol;
pub mod output;
pub mod pipeline;
pub mod ranking;
