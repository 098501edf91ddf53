//! Stable constants shared across layers.

/// Upstream CIP kernel tree (cgit on kernel.org).
pub const DEFAULT_REPO_SOURCE: &str =
    "https://git.kernel.org/pub/scm/linux/kernel/git/cip/linux-cip.git";

/// Raw wiki export carrying the SLTS support-schedule table.
pub const DEFAULT_SCHEDULE_SOURCE: &str =
    "https://wiki.linuxfoundation.org/civilinfrastructureplatform/start?do=export_raw";

/// Branches with no commit for this many days are reported STALE.
pub const DEFAULT_THRESHOLD_DAYS: u64 = 120;

/// Builder command looked up on PATH unless overridden.
pub const DEFAULT_BUILD_CMD: &str = "cip-kernel-build";

/// Boot-entry relabeling hook that must exist before a build is attempted.
pub const DEFAULT_BOOT_HOOK: &str = "/etc/kernel/install.d/95-cipbuild-label.install";

/// Versioned CIP branch naming convention.
pub const BRANCH_PATTERN: &str = r"^linux-(\d+)\.(\d+)\.y-cip(-rt)?(-rebase)?$";

/// Support-tier label cell of a schedule row, e.g. `SLTS v6.1-rt`.
pub const SLTS_LABEL_PATTERN: &str = r"^SLTS\s+v?(\d+)\.(\d+)(-rt)?\b";

/// Timeout for per-branch metadata lookups and schedule fetches.
pub const FETCH_TIMEOUT_MS: u64 = 5000;

/// Timeout for the branch listing itself. Listing a cold remote is slower
/// than a single metadata fetch, so it gets a wider window.
pub const LIST_TIMEOUT_MS: u64 = 30_000;
