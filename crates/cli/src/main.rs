use anyhow::{Context, Result};
use blockflow_core::workflow::plan;
use blockflow_core::{Job, JobStatus, Workflow};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

mod config;

use config::{AppState, RunnerConfig};

const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Parser, Debug)]
#[command(name = "blockflow")]
#[command(about = "Run block-based data pipelines", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "blockflow.toml")]
    config: PathBuf,

    /// Data directory for storage
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,

    /// Number of concurrent job workers
    #[arg(long, env = "BLOCKFLOW_POOL_SIZE")]
    pool_size: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a workflow once and print the finished job
    Run {
        /// Workflow definition (JSON)
        #[arg(short, long)]
        workflow: PathBuf,

        /// Input rows (JSON array or {"rows": [...]})
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Print the execution order of a workflow
    Plan {
        /// Workflow definition (JSON)
        #[arg(short, long)]
        workflow: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blockflow=info,blockflow_core=info".into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Plan { ref workflow } => {
            let workflow = read_workflow(workflow)?;
            let order = plan(&workflow)?;
            for (step, block_id) in order.iter().enumerate() {
                let name = workflow.block(block_id).map_or("", |b| b.name.as_str());
                println!("{}. {} ({})", step + 1, block_id, name);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Run {
            ref workflow,
            ref input,
        } => {
            tracing::info!("Data directory: {}", args.data_dir.display());

            let mut config = RunnerConfig::load(&args.config, args.data_dir.clone())?;
            if let Some(pool_size) = args.pool_size {
                config.engine.pool_size = pool_size;
            }

            let workflow = read_workflow(workflow)?;
            let input = input.as_deref().map(read_json).transpose()?;

            let job = run_once(&config, workflow, input).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&job).context("Failed to serialize job")?
            );

            if job.status == JobStatus::Completed {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

/// Submit one job, wait for it to finish and shut the scheduler down
async fn run_once(config: &RunnerConfig, workflow: Workflow, input: Option<Value>) -> Result<Job> {
    let state = AppState::new(config)?;
    state
        .workflow_store
        .save(&workflow)
        .await
        .context("Failed to store workflow")?;

    state.scheduler.start();
    let job_id = state.scheduler.submit_by_id(&workflow.id, input).await?;
    tracing::info!("Submitted job {}", job_id);

    let mut ticker = tokio::time::interval(STATUS_POLL_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let job = loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::warn!("Interrupted, cancelling job {}", job_id);
                state.scheduler.cancel(job_id).await?;
                break state.scheduler.get_job(job_id).await?;
            }
            _ = ticker.tick() => {
                let job = state.scheduler.get_job(job_id).await?;
                if job.status.is_terminal() {
                    break job;
                }
                tracing::debug!("Job {}: {}", job_id, job.progress.message);
            }
        }
    };

    state.scheduler.stop().await;
    Ok(job)
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn read_workflow(path: &Path) -> Result<Workflow> {
    let value = read_json(path)?;
    serde_json::from_value(value).with_context(|| format!("Invalid workflow in {}", path.display()))
}
