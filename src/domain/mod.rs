//! Shared data model layer (structs/constants only).
//!
//! ## Purpose
//! - Keep catalog/schedule/cache DTOs and report structs in one place.
//! - Avoid cyclic imports and duplicated type definitions.
//! - Make JSON output schema changes explicit and reviewable.
//!
//! ## Files
//! - `models.rs` — branch/schedule/cache/report structs.
//! - `constants.rs` — default sources, patterns, thresholds.
//!
//! ## Rule of thumb
//! Domain types should be data-only: no filesystem/network side effects.
//!
//! ## Compatibility note
//! Changes in these structs can affect `--json` outputs and integration
//! contracts. Keep schema-impacting changes synchronized with
//! `docs/contracts/*`.

pub mod constants;
pub mod models;
