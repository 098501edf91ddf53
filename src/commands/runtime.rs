use crate::catalog;
use crate::cli::{Cli, Commands, Config};
use crate::domain::constants::FETCH_TIMEOUT_MS;
use crate::domain::models::{BuildReport, RankedRow, ShowReport, StatusRow};
use crate::services::cache::{self, BranchCache};
use crate::services::eol;
use crate::services::output::{self, emit_one, emit_rows};
use crate::services::pipeline::{self, BuildPipeline, ProcessPipeline};
use crate::services::ranking;

/// The ranked catalog as resolved for one invocation.
struct CatalogView {
    rows: Vec<RankedRow>,
    active: Vec<RankedRow>,
    now: i64,
}

/// Resolve the full catalog: branch listing, timestamps, schedule, ranking.
/// Every subcommand except `status` starts here.
fn ranked_catalog(cfg: &Config) -> anyhow::Result<CatalogView> {
    catalog::require_git()?;
    let refs = catalog::list_branches(&cfg.repo, cfg.include_rebase)?;
    let mut branches = catalog::resolve_timestamps(&cfg.repo, refs, FETCH_TIMEOUT_MS);
    let schedule = eol::load_schedule(&cfg.schedule);
    let now = chrono::Utc::now().timestamp();
    ranking::classify_all(&mut branches, now, cfg.threshold_days);
    let rows = ranking::build_rows(&branches, &schedule, now);
    let active = ranking::active_rows(&rows);
    Ok(CatalogView { rows, active, now })
}

pub fn handle_runtime_commands(cli: &Cli, cfg: &Config) -> anyhow::Result<()> {
    match &cli.command {
        // Offline view of persisted entries; never touches the network.
        Commands::Status => status(cli, cfg),
        Commands::List => {
            let view = ranked_catalog(cfg)?;
            emit_rows(cli.json, &view.rows, output::ranked_line)
        }
        Commands::Active => {
            let view = ranked_catalog(cfg)?;
            emit_rows(cli.json, &view.active, output::ranked_line)
        }
        Commands::Show { branch } => {
            let view = ranked_catalog(cfg)?;
            let row = view
                .rows
                .iter()
                .find(|r| r.branch == *branch)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("branch not in catalog: {}", branch))?;
            let cache = BranchCache::open(cfg, branch);
            let report = ShowReport {
                cache_state: cache.state(Some(&row.sha)),
                row,
            };
            emit_one(cli.json, report, |r| {
                format!("{}\t{:?}", output::ranked_line(&r.row), r.cache_state)
            })
        }
        Commands::Plan { branch } => {
            let view = ranked_catalog(cfg)?;
            let selected = select(&view, branch.as_deref(), cfg)?;
            let sha = head_sha(&view.rows, &selected);
            let cache = BranchCache::open(cfg, &selected);
            let plan = cache.plan(&sha, cfg);
            emit_one(cli.json, plan, |p| {
                format!(
                    "{}\t{:?}\tclean={}\tsaved_config={}",
                    p.branch,
                    p.action,
                    p.clean,
                    p.saved_config.is_some()
                )
            })
        }
        Commands::Build { branch } => {
            let view = ranked_catalog(cfg)?;
            let selected = select(&view, branch.as_deref(), cfg)?;
            run_build(cli, cfg, &view, &selected)
        }
    }
}

/// Resolve which branch to operate on, from the subcommand argument, the
/// configured override, or the top-ranked ACTIVE branch.
fn select(view: &CatalogView, requested: Option<&str>, cfg: &Config) -> anyhow::Result<String> {
    let requested = requested.or(cfg.branch_override.as_deref());
    match ranking::resolve_selection(&view.rows, &view.active, requested) {
        Some(branch) => Ok(branch),
        None => match requested {
            Some(name) => anyhow::bail!("branch not in catalog: {}", name),
            None => anyhow::bail!("no ACTIVE branch to select; pass a branch explicitly"),
        },
    }
}

fn head_sha(rows: &[RankedRow], branch: &str) -> String {
    rows.iter()
        .find(|r| r.branch == branch)
        .map(|r| r.sha.clone())
        .unwrap_or_default()
}

fn run_build(cli: &Cli, cfg: &Config, view: &CatalogView, branch: &str) -> anyhow::Result<()> {
    pipeline::preflight(&cfg.build_cmd, &cfg.boot_hook, cfg.allow_root)?;

    let cache = BranchCache::open(cfg, branch);
    let _lock = cache.lock()?;
    let sha = head_sha(&view.rows, branch);
    let plan = cache.plan(&sha, cfg);

    cache::audit(
        "build_start",
        serde_json::json!({"branch": branch, "action": plan.action}),
    );

    let pipe = ProcessPipeline {
        build_cmd: cfg.build_cmd.clone(),
        ccache_dir: cfg.ccache_dir.clone(),
    };
    let outcome = match pipe.run(&cfg.repo, &plan) {
        Ok(outcome) => outcome,
        Err(e) => {
            // The record keeps its pre-build state; the next run retries.
            cache::audit(
                "build_failed",
                serde_json::json!({"branch": branch, "error": e.to_string()}),
            );
            return Err(e);
        }
    };
    cache.commit_success(&outcome, view.now)?;

    let report = BuildReport {
        branch: branch.to_string(),
        action: plan.action,
        kernel_version: outcome.kernel_version,
        commit: outcome.commit,
    };
    emit_one(cli.json, report, |r| {
        format!("built {} {} ({})", r.branch, r.kernel_version, r.commit)
    })
}

fn status(cli: &Cli, cfg: &Config) -> anyhow::Result<()> {
    let mut out = Vec::new();
    for entry in cache::all_entries(cfg)? {
        let rec = entry.record();
        out.push(StatusRow {
            branch: entry.branch.clone(),
            state: entry.state(None),
            kernel_version: rec.as_ref().map(|r| r.kernel_version.clone()),
            commit: rec.as_ref().map(|r| r.commit.clone()),
            built_at_epoch: rec.as_ref().map(|r| r.built_at_epoch),
            source_tree_present: entry.source_tree_present(),
            saved_config_present: entry.saved_config().is_some(),
        });
    }
    emit_rows(cli.json, &out, |r| {
        format!(
            "{}\t{:?}\t{}",
            r.branch,
            r.state,
            r.kernel_version.as_deref().unwrap_or("-")
        )
    })
}
