//! CLI command definitions for compliance-ai.
//!
//! Configuration comes from the environment (see [`PipelineConfig::from_env`])
//! and flags given here override it.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use tracing::{info, warn};

use crate::compliance::Regulation;
use crate::metrics::init_metrics;
use crate::pipeline::{CompliancePipeline, PipelineConfig};
use crate::server::{self, AppState};
use crate::storage::{MemoryStore, MigrationRunner, PgStore, RecordStore};

/// Compliance automation backend.
#[derive(Parser)]
#[command(name = "compliance-ai")]
#[command(about = "Analyze regulations and plan compliance work with a staged LLM pipeline")]
#[command(version)]
#[command(
    long_about = "compliance-ai runs regulations through analysis, impact assessment, action planning and report generation.\n\nExample usage:\n  compliance-ai serve --bind 0.0.0.0:8000\n  compliance-ai run --source GDPR --title \"Breach notification\" --content-file art33.txt"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Serve the HTTP API.
    Serve(ServeArgs),

    /// Run the pipeline once and print the outcome as JSON.
    Run(RunArgs),

    /// Apply (or reset) the PostgreSQL schema.
    Migrate(MigrateArgs),
}

/// Overrides shared by commands that run the pipeline.
#[derive(clap::Args, Debug, Default)]
pub struct PipelineArgs {
    /// Completion model.
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// OpenAI-compatible API base URL.
    #[arg(long)]
    pub api_base: Option<String>,

    /// Seconds allowed for a single completion call.
    #[arg(long)]
    pub completion_timeout: Option<u64>,

    /// PostgreSQL URL. Without one, records are kept in memory.
    #[arg(long)]
    pub database_url: Option<String>,
}

impl PipelineArgs {
    fn apply(&self, mut config: PipelineConfig) -> anyhow::Result<PipelineConfig> {
        if let Some(model) = &self.model {
            config = config.with_model(model.clone());
        }
        if let Some(base) = &self.api_base {
            config = config.with_llm_api_base(base.clone());
        }
        if let Some(secs) = self.completion_timeout {
            config = config.with_completion_timeout(Duration::from_secs(secs));
        }
        if let Some(url) = &self.database_url {
            config = config.with_database_url(url.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind, e.g. 0.0.0.0:8000.
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Browser origin allowed by CORS.
    #[arg(long)]
    pub cors_origin: Option<String>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// JSON file holding a regulation. Conflicts with the inline flags.
    #[arg(short, long, conflicts_with_all = ["source", "title", "content", "content_file"])]
    pub file: Option<PathBuf>,

    /// Issuing body, e.g. SEC.
    #[arg(long)]
    pub source: Option<String>,

    #[arg(long)]
    pub title: Option<String>,

    /// Regulation text.
    #[arg(long, conflicts_with = "content_file")]
    pub content: Option<String>,

    /// File containing the regulation text.
    #[arg(long)]
    pub content_file: Option<PathBuf>,

    /// Compliance due date (YYYY-MM-DD).
    #[arg(long)]
    pub due_date: Option<String>,

    /// Date action deadlines are computed from (default: today).
    #[arg(long)]
    pub planning_date: Option<NaiveDate>,

    /// Write the outcome here instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Parser, Debug)]
pub struct MigrateArgs {
    /// PostgreSQL URL.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Drop all tables and the migrations log before migrating.
    #[arg(long)]
    pub reset: bool,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parse arguments and run. Use `parse_cli()` and `run_with_cli()` to
/// initialize logging in between.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve(args) => run_serve_command(args).await,
        Commands::Run(args) => run_pipeline_command(args).await,
        Commands::Migrate(args) => run_migrate_command(args).await,
    }
}

/// PostgreSQL when configured (migrated on open), memory otherwise.
async fn open_store(config: &PipelineConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url)
                .await
                .context("failed to connect to PostgreSQL")?;
            let applied = store.run_migrations().await?;
            info!(applied, "Database ready");
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL not set, records are kept in memory only");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn run_serve_command(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = args.pipeline.apply(PipelineConfig::from_env()?)?;
    if let Some(bind) = args.bind {
        config = config.with_bind_addr(bind);
    }
    if let Some(origin) = args.cors_origin {
        config = config.with_cors_origin(origin);
    }
    if config.llm_api_key.is_none() {
        warn!("OPENAI_API_KEY not set, completion calls will likely be rejected");
    }

    init_metrics()?;
    let store = open_store(&config).await?;
    let pipeline = CompliancePipeline::from_config(&config, store)?;
    let state = Arc::new(AppState::new(pipeline));

    server::serve(state, &config.bind_addr, &config.cors_origin)
        .await
        .with_context(|| format!("server on {} stopped", config.bind_addr))
}

fn read_regulation(args: &RunArgs) -> anyhow::Result<Regulation> {
    if let Some(path) = &args.file {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        return serde_json::from_str(&raw)
            .with_context(|| format!("{} is not a regulation JSON document", path.display()));
    }

    let content = match (&args.content, &args.content_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, None) => anyhow::bail!("either --file, --content or --content-file is required"),
    };
    let source = args.source.clone().context("--source is required")?;
    let title = args.title.clone().context("--title is required")?;

    let mut regulation = Regulation::new(source, title, content);
    regulation.due_date = args.due_date.clone();
    Ok(regulation)
}

async fn run_pipeline_command(args: RunArgs) -> anyhow::Result<()> {
    let config = args.pipeline.apply(PipelineConfig::from_env()?)?;
    let regulation = read_regulation(&args)?;

    let _ = init_metrics();
    let store = open_store(&config).await?;
    let mut pipeline = CompliancePipeline::from_config(&config, store)?;
    if let Some(date) = args.planning_date {
        pipeline = pipeline.with_planning_date(date);
    }

    let outcome = pipeline.run(regulation).await;
    let json = serde_json::to_string_pretty(&outcome)?;
    match &args.output {
        Some(path) => {
            fs::write(path, &json).with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "Outcome written");
        }
        None => println!("{}", json),
    }

    if !outcome.is_success() {
        anyhow::bail!("pipeline failed: {}", outcome.errors.join("; "));
    }
    Ok(())
}

async fn run_migrate_command(args: MigrateArgs) -> anyhow::Result<()> {
    let store = PgStore::connect(&args.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;
    let runner = MigrationRunner::new(store.pool().clone());

    if args.reset {
        warn!("Resetting database");
        runner.reset_database().await?;
    }
    let applied = runner.run_migrations().await?;
    info!(applied, "Migrations applied");

    for migration in runner.applied_migrations().await? {
        println!("{}", migration.name);
    }
    Ok(())
}
