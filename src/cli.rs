use crate::domain::constants::{
    DEFAULT_BOOT_HOOK, DEFAULT_BUILD_CMD, DEFAULT_REPO_SOURCE, DEFAULT_SCHEDULE_SOURCE,
    DEFAULT_THRESHOLD_DAYS,
};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "cipbuild",
    version,
    about = "CIP LTS kernel branch tracker and build driver"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(long, global = true, help = "Kernel repository (URL or local path)")]
    pub repo: Option<String>,
    #[arg(long, global = true, help = "Support-schedule document (URL or file)")]
    pub schedule: Option<String>,
    #[arg(
        long,
        global = true,
        help = "Days without commits before a branch is STALE"
    )]
    pub threshold_days: Option<u64>,
    #[arg(long, global = true, help = "Include -rebase branches in the catalog")]
    pub include_rebase: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Full ranked branch catalog
    List,
    /// ACTIVE branches only, longest remaining support first
    Active,
    /// One branch's ranked row and its cache state
    Show { branch: String },
    /// Resolve the selection and print the build plan, no side effects
    Plan { branch: Option<String> },
    /// Run the external build pipeline for the selected branch
    Build { branch: Option<String> },
    /// Persisted build cache entries
    Status,
}

/// Optional `~/.config/cipbuild/config.toml`. Every key is optional;
/// environment variables and flags override it.
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    repo: Option<String>,
    schedule: Option<String>,
    threshold_days: Option<u64>,
    include_rebase: Option<bool>,
    ccache_dir: Option<PathBuf>,
    build_cache_dir: Option<PathBuf>,
    config_cache_dir: Option<PathBuf>,
    use_ccache: Option<bool>,
    localmodconfig: Option<bool>,
    incremental: Option<bool>,
    debug_symbols: Option<bool>,
    branch: Option<String>,
    build_cmd: Option<String>,
    boot_hook: Option<PathBuf>,
    allow_root: Option<bool>,
}

/// Fully resolved runtime configuration: flags > `CIPBUILD_*` env >
/// config.toml > defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub repo: String,
    pub schedule: String,
    pub threshold_days: u64,
    pub include_rebase: bool,
    /// Compiler-cache root, handed to the pipeline untouched.
    pub ccache_dir: PathBuf,
    /// Root of the per-branch kernel source trees.
    pub build_cache_dir: PathBuf,
    /// Root of the per-branch records, saved configs and markers.
    pub config_cache_dir: PathBuf,
    pub use_ccache: bool,
    pub localmodconfig: bool,
    pub incremental: bool,
    pub debug_symbols: bool,
    /// Non-interactive branch override for automation.
    pub branch_override: Option<String>,
    pub build_cmd: String,
    pub boot_hook: PathBuf,
    pub allow_root: bool,
}

impl Config {
    /// Defaults rooted at the given home directory.
    pub fn for_home(home: &Path) -> Self {
        Self {
            repo: DEFAULT_REPO_SOURCE.to_string(),
            schedule: DEFAULT_SCHEDULE_SOURCE.to_string(),
            threshold_days: DEFAULT_THRESHOLD_DAYS,
            include_rebase: false,
            ccache_dir: home.join(".cache/cipbuild/ccache"),
            build_cache_dir: home.join(".cache/cipbuild/build"),
            config_cache_dir: home.join(".config/cipbuild/branches"),
            use_ccache: true,
            localmodconfig: true,
            incremental: true,
            debug_symbols: false,
            branch_override: None,
            build_cmd: DEFAULT_BUILD_CMD.to_string(),
            boot_hook: PathBuf::from(DEFAULT_BOOT_HOOK),
            allow_root: false,
        }
    }

    pub fn resolve(cli: &Cli) -> anyhow::Result<Self> {
        let home = std::env::var("HOME")?;
        let home = Path::new(&home);
        let mut cfg = Self::for_home(home);

        let file = load_file_config(home)?;
        apply(&mut cfg.repo, file.repo);
        apply(&mut cfg.schedule, file.schedule);
        apply(&mut cfg.threshold_days, file.threshold_days);
        apply(&mut cfg.include_rebase, file.include_rebase);
        apply(&mut cfg.ccache_dir, file.ccache_dir);
        apply(&mut cfg.build_cache_dir, file.build_cache_dir);
        apply(&mut cfg.config_cache_dir, file.config_cache_dir);
        apply(&mut cfg.use_ccache, file.use_ccache);
        apply(&mut cfg.localmodconfig, file.localmodconfig);
        apply(&mut cfg.incremental, file.incremental);
        apply(&mut cfg.debug_symbols, file.debug_symbols);
        cfg.branch_override = file.branch.or(cfg.branch_override);
        apply(&mut cfg.build_cmd, file.build_cmd);
        apply(&mut cfg.boot_hook, file.boot_hook);
        apply(&mut cfg.allow_root, file.allow_root);

        apply(&mut cfg.repo, env_str("CIPBUILD_REPO"));
        apply(&mut cfg.schedule, env_str("CIPBUILD_SCHEDULE"));
        apply(
            &mut cfg.threshold_days,
            env_str("CIPBUILD_THRESHOLD_DAYS").and_then(|v| v.parse().ok()),
        );
        apply(&mut cfg.include_rebase, env_bool("CIPBUILD_INCLUDE_REBASE"));
        apply(
            &mut cfg.ccache_dir,
            env_str("CIPBUILD_CCACHE_DIR").map(PathBuf::from),
        );
        apply(
            &mut cfg.build_cache_dir,
            env_str("CIPBUILD_BUILD_CACHE_DIR").map(PathBuf::from),
        );
        apply(
            &mut cfg.config_cache_dir,
            env_str("CIPBUILD_CONFIG_CACHE_DIR").map(PathBuf::from),
        );
        apply(&mut cfg.use_ccache, env_bool("CIPBUILD_CCACHE"));
        apply(&mut cfg.localmodconfig, env_bool("CIPBUILD_LOCALMODCONFIG"));
        apply(&mut cfg.incremental, env_bool("CIPBUILD_INCREMENTAL"));
        apply(&mut cfg.debug_symbols, env_bool("CIPBUILD_DEBUG_SYMBOLS"));
        cfg.branch_override = env_str("CIPBUILD_BRANCH").or(cfg.branch_override);
        apply(&mut cfg.build_cmd, env_str("CIPBUILD_BUILD_CMD"));
        apply(
            &mut cfg.boot_hook,
            env_str("CIPBUILD_BOOT_HOOK").map(PathBuf::from),
        );
        apply(&mut cfg.allow_root, env_bool("CIPBUILD_ALLOW_ROOT"));

        apply(&mut cfg.repo, cli.repo.clone());
        apply(&mut cfg.schedule, cli.schedule.clone());
        apply(&mut cfg.threshold_days, cli.threshold_days);
        if cli.include_rebase {
            cfg.include_rebase = true;
        }

        Ok(cfg)
    }
}

fn apply<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

fn load_file_config(home: &Path) -> anyhow::Result<FileConfig> {
    let path = home.join(".config/cipbuild/config.toml");
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&raw)?)
}

fn env_str(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|v| parse_bool(&v))
}

fn parse_bool(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
