use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod candidates;
mod config;
mod db;
mod extract;
mod models;
mod normalize;
mod pipeline;
mod report;
mod roster;
mod scoring;
mod select;
mod stats;

use config::ScoringConfig;
use extract::{EntityExtractor, Lexicon, WhitelistMode};
use pipeline::{PipelineMode, RunInputs};
use roster::Roster;

#[derive(Parser)]
#[command(name = "spotlight")]
#[command(about = "Picks the players worth talking about on today's football podcast", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Show the player names found in each news item
    Extract {
        #[arg(long)]
        items: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        whitelist: Option<PathBuf>,
        /// Drop names that are not on the whitelist instead of preferring them
        #[arg(long)]
        enforce: bool,
    },
    /// Score and select today's players
    Rank {
        #[arg(long, value_enum, default_value_t = PipelineMode::Mentions)]
        mode: PipelineMode,
        #[arg(long)]
        items: Option<PathBuf>,
        #[arg(long)]
        roster: Option<PathBuf>,
        #[arg(long)]
        stats: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        whitelist: Option<PathBuf>,
        /// Drop club-only and non-whitelisted candidates in candidates mode
        #[arg(long)]
        enforce_whitelist: bool,
        #[arg(long, default_value_t = 3)]
        top: usize,
        /// Reference time (RFC 3339), defaults to now
        #[arg(long)]
        now: Option<String>,
        /// Write the ranked result as JSON
        #[arg(long)]
        out: Option<PathBuf>,
        /// Write a markdown report
        #[arg(long)]
        report: Option<PathBuf>,
        /// Store the run in Postgres
        #[arg(long)]
        persist: bool,
    },
    /// List recent stored runs
    History {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// Render the markdown report for a stored run
    Report {
        #[arg(long)]
        run_id: Uuid,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set for commands that use Postgres")?;
    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

fn reference_time(raw: Option<&str>) -> anyhow::Result<DateTime<Utc>> {
    match raw {
        Some(raw) => Ok(DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("--now must be RFC 3339, got {raw}"))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

fn load_whitelist(path: Option<&PathBuf>) -> anyhow::Result<Option<Lexicon>> {
    match path {
        Some(path) => Lexicon::load(path),
        None => Ok(None),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Extract {
            items,
            config,
            whitelist,
            enforce,
        } => {
            let config = ScoringConfig::load(config.as_deref())?;
            let mode = if enforce {
                WhitelistMode::Enforce
            } else {
                WhitelistMode::Prefer
            };
            let extractor = EntityExtractor::new(&config, load_whitelist(whitelist.as_ref())?, mode);
            info!(
                mode = ?extractor.mode(),
                whitelist = extractor.whitelist().map_or(0, Lexicon::len),
                "extracting names"
            );
            let records = normalize::read_records(&items)?;
            for item in normalize::Normalizer::new(&extractor).normalize_all(records) {
                println!("{}: {}", item.id, item.extracted_players.join(", "));
            }
        }
        Commands::Rank {
            mode,
            items,
            roster,
            stats: stats_path,
            config,
            whitelist,
            enforce_whitelist,
            top,
            now,
            out,
            report: report_path,
            persist,
        } => {
            let config = ScoringConfig::load(config.as_deref())?;
            let mut inputs = RunInputs::new(config, reference_time(now.as_deref())?, top);
            inputs.whitelist = load_whitelist(whitelist.as_ref())?;
            inputs.enforce_whitelist = enforce_whitelist;
            if let Some(path) = &roster {
                inputs.roster = Roster::load(path)
                    .with_context(|| format!("failed to load roster {}", path.display()))?;
            }
            if let Some(path) = &items {
                inputs.records = normalize::read_records(path)?;
            }
            if let Some(path) = &stats_path {
                inputs.stats = stats::read_stat_lines(path)?;
            }
            if inputs.roster.is_empty() && mode == PipelineMode::Candidates {
                warn!("no roster loaded, candidates mode has nothing to match against");
            }
            info!(
                mode = %mode,
                records = inputs.records.len(),
                stat_lines = inputs.stats.len(),
                roster = inputs.roster.len(),
                "starting run"
            );

            let outcome = pipeline::run(mode, &inputs);

            let run_id = if persist {
                let pool = connect().await?;
                let run_id = db::save_run(&pool, &outcome).await?;
                info!(%run_id, "run stored");
                Some(run_id)
            } else {
                None
            };

            for line in report::summary_lines(&outcome.selection) {
                println!("{line}");
            }
            if let Some(out) = out {
                let json = report::result_json(&outcome, run_id)?;
                std::fs::write(&out, json)
                    .with_context(|| format!("failed to write {}", out.display()))?;
                println!("Result written to {}.", out.display());
            }
            if let Some(path) = report_path {
                let markdown = report::build_report(
                    mode.as_str(),
                    outcome.reference_time,
                    run_id,
                    &outcome.selection,
                );
                std::fs::write(&path, markdown)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Report written to {}.", path.display());
            }
        }
        Commands::History { limit } => {
            let pool = connect().await?;
            let runs = db::fetch_recent_runs(&pool, limit).await?;
            if runs.is_empty() {
                println!("No runs stored yet.");
                return Ok(());
            }
            for run in runs {
                println!(
                    "- {} {} ({} mode) reference {} | {} items, {} selected",
                    run.created_at.format("%Y-%m-%d %H:%M"),
                    run.run_id,
                    run.mode,
                    run.reference_time.format("%Y-%m-%d %H:%M"),
                    run.item_count,
                    run.selected_count
                );
            }
        }
        Commands::Report { run_id, out } => {
            let pool = connect().await?;
            let (summary, selection) = db::fetch_run(&pool, run_id)
                .await?
                .with_context(|| format!("no stored run with id {run_id}"))?;
            let markdown =
                report::build_report(&summary.mode, summary.reference_time, Some(run_id), &selection);
            std::fs::write(&out, markdown)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
