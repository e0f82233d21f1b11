//! `rusty-automation-tool` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`    — start the API server and the scheduler's cron tick loop.
//! - `run`      — submit one of the registered demo jobs immediately.
//! - `list`     — list registered jobs and their schedules.
//! - `validate` — validate a job DAG definition JSON file.

mod demos;

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "rusty-automation-tool",
    about = "Lightweight DAG workflow scheduler",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server and the scheduler's tick loop.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
    },
    /// Submit a registered job immediately, bypassing its schedule.
    Run {
        /// Name of a registered job (see `list`).
        name: String,
    },
    /// List every registered job, its schedule, and active flag.
    List,
    /// Validate a job DAG definition file (node/edge JSON) for cycles.
    Validate {
        /// Path to the DAG JSON file: `{"nodes": [...], "edges": [["a","b"]]}`.
        path: std::path::PathBuf,
    },
}

#[derive(serde::Deserialize)]
struct DagFile {
    nodes: Vec<String>,
    edges: Vec<(String, String)>,
}

async fn build_scheduler() -> anyhow::Result<Arc<engine::Scheduler>> {
    let scheduler = engine::Scheduler::new();
    for (name, factory) in demos::factories() {
        let preview = factory();
        let (schedule, active) = (preview.schedule.clone(), preview.active);
        scheduler
            .register(name, schedule, active, factory)
            .await
            .with_context(|| format!("failed to register job '{name}'"))?;
    }
    Ok(scheduler)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind } => {
            let scheduler = build_scheduler().await?;
            scheduler.start();
            info!("Starting API server on {bind}");
            api::serve(&bind, scheduler).await.context("API server exited with an error")?;
        }
        Command::Run { name } => {
            let scheduler = build_scheduler().await?;
            let handle = scheduler
                .run_job(&name)
                .await
                .with_context(|| format!("failed to submit run for job '{name}'"))?;
            println!("submitted run {} for job {}", handle.run_id, handle.job_name);
        }
        Command::List => {
            let scheduler = build_scheduler().await?;
            for (name, schedule, active) in scheduler.list_jobs().await {
                println!("{name}\t{schedule}\tactive={active}");
            }
        }
        Command::Validate { path } => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read file {}", path.display()))?;
            let dag_file: DagFile = serde_json::from_str(&content).context("invalid JSON")?;

            let mut dag = engine::Dag::new();
            for node in &dag_file.nodes {
                dag.add_node(node.clone()).context("invalid DAG")?;
            }
            for (from, to) in &dag_file.edges {
                dag.set_downstream(from, to).context("invalid DAG")?;
            }

            match dag.topological_order() {
                Some(order) => println!("DAG is valid. Execution order: {order:?}"),
                None => bail!("invalid DAG: cycle detected"),
            }
        }
    }

    Ok(())
}
