//! `crm-worker`: runs the CRM maintenance jobs on a schedule, or one job on demand.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::runtime::{Handle, Runtime};
use tracing::{info, warn};

use crm_jobs::{
    load_config, DataStore, HttpGateway, Job, JobContext, JobName, JobResultExt, JobScheduler, LogDirectory,
    PostgresDataStore, WorkerConfig,
};
use crm_observability::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "crm-worker", version, about = "Scheduled CRM maintenance jobs")]
pub struct Cli {
    /// TOML config file. Without it, `crm-worker.toml` in the working directory is used if present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Human-readable diagnostic logs instead of JSON.
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run every enabled job on its cadence until interrupted (default).
    Serve,

    /// Run one job now, print its audit lines and exit; non-zero exit on failure.
    RunOnce {
        /// heartbeat, low_stock, order_reminders or report
        job: JobName,
    },
}

impl Cli {
    pub fn log_format(&self) -> LogFormat {
        if self.pretty { LogFormat::Pretty } else { LogFormat::Json }
    }
}

/// Execute the parsed command. `Ok(false)` means the command ran but a job failed.
pub fn run(cli: Cli) -> Result<bool> {
    let config = load_config(cli.config.as_deref()).context("failed to load worker config")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("crm-worker-rt")
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    let context = build_context(&config, runtime.handle())?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config, &context, &runtime).map(|()| true),
        Command::RunOnce { job } => Ok(run_once(&config, &context, job)),
    }
}

/// Build the shared handles: HTTP gateway, optional Postgres store, log directory.
pub fn build_context(config: &WorkerConfig, runtime: &Handle) -> Result<JobContext> {
    let gateway = HttpGateway::new(&config.endpoint_url).context("failed to build HTTP client")?;

    let store: Option<Arc<dyn DataStore>> = match config.database_url.as_deref() {
        Some(url) => {
            let store = PostgresDataStore::connect_lazy(url, runtime.clone()).context("invalid database_url")?;
            Some(Arc::new(store))
        }
        None => {
            info!("no database_url configured; report fallback disabled");
            None
        }
    };

    let logs = LogDirectory::new(&config.log_dir);
    logs.ensure()
        .with_context(|| format!("failed to create log directory {}", config.log_dir.display()))?;

    Ok(JobContext::new(Arc::new(gateway), store, logs))
}

fn serve(config: &WorkerConfig, context: &JobContext, runtime: &Runtime) -> Result<()> {
    let scheduler = JobScheduler::from_config(context, &config.jobs);
    let jobs = scheduler.job_names();
    if jobs.is_empty() {
        warn!("no jobs enabled; nothing to do");
        return Ok(());
    }

    let handle = scheduler.spawn().context("failed to start scheduler")?;
    info!(jobs = ?jobs, endpoint = %config.endpoint_url, log_dir = %config.log_dir.display(), "scheduler started");

    runtime
        .block_on(tokio::signal::ctrl_c())
        .context("failed to listen for shutdown signal")?;

    info!("shutdown requested; waiting for running jobs");
    let mut stats: Vec<_> = handle.shutdown().into_iter().collect();
    stats.sort_by_key(|(job, _)| *job);
    for (job, s) in stats {
        info!(job = %job, runs = s.runs, succeeded = s.succeeded, failed = s.failed, "final job stats");
    }

    Ok(())
}

fn run_once(config: &WorkerConfig, context: &JobContext, job: JobName) -> bool {
    let result = context.build_job(job, config.jobs.get(job)).run();

    for line in &result.run().lines {
        println!("{line}");
    }

    match result {
        Ok(_) => true,
        Err(failure) => {
            warn!(error = %failure, "run-once failed");
            false
        }
    }
}
