mod config;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use harvest_core::app::{EngineBuilder, LedgerStatus, TriggerRegistrar};
use harvest_core::domain::{JobExecution, JobId};
use harvest_core::impls::Database;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::HarvestConfig;

#[derive(Debug, Parser)]
#[command(name = "harvest", version, about = "Scheduled record pulls with an execution ledger")]
struct Cli {
    /// Config file; missing file means defaults + env.
    #[arg(long, short, default_value = "harvest.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register the configured jobs and run until ctrl-c.
    Serve,
    /// Run one job right away.
    Run {
        job: String,
        /// Logical date (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Drive an unfinished (pending, running or retrying) row to completion.
    Resume { job_id: i64 },
    /// Latest ledger rows, newest first.
    Recent {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Rows that have not finished, oldest first.
    Pending {
        #[arg(long)]
        job: Option<String>,
        /// Exit with an error when any row is listed.
        #[arg(long)]
        check: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("harvest_core=info,harvest_cli=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = HarvestConfig::load(&cli.config)?;
    let registrar = build_engine(&config)?;

    match cli.command {
        Command::Serve => serve(&registrar, &config).await,
        Command::Run { job, date } => run(&registrar, &job, date).await,
        Command::Resume { job_id } => resume(&registrar, JobId::new(job_id)).await,
        Command::Recent { limit } => {
            let rows = registrar.orchestrator().ledger().list_recent(limit).await?;
            print_rows(&rows);
            Ok(())
        }
        Command::Pending { job, check } => {
            let status =
                LedgerStatus::collect(registrar.orchestrator().ledger().as_ref(), job.as_deref(), 0)
                    .await?;
            print_rows(&status.unfinished);
            println!(
                "pending={} running={} retrying={} failed={} finished={}",
                status.counts.pending,
                status.counts.running,
                status.counts.retrying,
                status.counts.failed,
                status.counts.finished
            );
            if check && !status.is_clean() {
                bail!("{} executions need attention", status.unfinished.len());
            }
            Ok(())
        }
    }
}

fn build_engine(config: &HarvestConfig) -> Result<TriggerRegistrar> {
    let path = &config.database.path;
    let database =
        Database::open(path).with_context(|| format!("opening database {}", path.display()))?;
    let expected: Vec<&str> = config.enabled_jobs().map(|j| j.name.as_str()).collect();

    let registrar = EngineBuilder::new(database)
        .with_file_sources(&config.sources.export_dir)?
        .max_retries(config.engine.max_retries)
        .retry_policy(config.retry_policy())
        .utc_offset(config.utc_offset()?)
        .expect_jobs(&expected)
        .build()?;
    Ok(registrar)
}

async fn serve(registrar: &TriggerRegistrar, config: &HarvestConfig) -> Result<()> {
    for job in config.enabled_jobs() {
        registrar
            .register(&job.name, &job.schedule, job.date_rule)
            .await
            .with_context(|| format!("registering {}", job.name))?;
    }
    registrar.start().await?;
    info!(entries = registrar.entries().len(), "harvest started");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    registrar.shutdown().await?;
    Ok(())
}

async fn run(registrar: &TriggerRegistrar, job: &str, date: Option<NaiveDate>) -> Result<()> {
    let date = date.unwrap_or_else(|| registrar.today());
    let results = registrar.run_now(job, date).await?;

    let mut not_finished = 0;
    for result in &results {
        match result {
            Ok(outcome) => {
                println!("{}", serde_json::to_string(outcome)?);
                if !outcome.is_success() {
                    not_finished += 1;
                }
            }
            Err(e) => {
                eprintln!("{job} {date}: {e} ({:?})", e.kind());
                not_finished += 1;
            }
        }
    }
    if not_finished > 0 {
        bail!("{not_finished} of {} executions did not finish", results.len());
    }
    Ok(())
}

async fn resume(registrar: &TriggerRegistrar, job_id: JobId) -> Result<()> {
    let outcome = registrar
        .resume(job_id)
        .await
        .with_context(|| format!("resuming {job_id}"))?;
    println!("{}", serde_json::to_string(&outcome)?);
    if !outcome.is_success() {
        bail!("{job_id} ended {}: {}", outcome.status, outcome.message);
    }
    Ok(())
}

fn print_rows(rows: &[JobExecution]) {
    for row in rows {
        println!(
            "{:>6}  {:<18} {}  {:<8} retries={}/{}  {}ms  {}",
            row.job_id.get(),
            row.job_name,
            row.job_date,
            row.job_status,
            row.retry_count,
            row.max_retries,
            row.execution_time_ms,
            row.message.as_deref().unwrap_or("-"),
        );
    }
}
