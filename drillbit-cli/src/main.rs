//! Drillbit CLI - create financial statements and watch their tasks

mod config;

use anyhow::Context;
use clap::Parser;
use drillbit_client::{Frequency, StatementQuery};
use drillbit_tracker::{
    CreateOutcome, HttpBackend, Progress, StatementBackend, TaskStatus, TrackerConfig, Workspace,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{Args, Command, Target};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("drillbit={},warn", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(2);
    }

    let mut config = TrackerConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    args.apply(&mut config);
    info!(base_url = %config.client.base_url, "Using Drillbit API");

    let backend = Arc::new(HttpBackend::from_config(config.client.clone())?);

    match args.command {
        Command::Statements {
            target,
            frequency,
            overwrite,
            lock,
        } => {
            let ok = run_statements(backend, &config, &target, frequency, overwrite, lock).await?;
            if !ok {
                std::process::exit(1);
            }
        }
        Command::Exists { target, frequency } => {
            let workspace = open(backend.clone(), &config, &target).await?;
            let keys = workspace.simulations()?;
            let query = StatementQuery::new(
                target.environment,
                keys.iter().map(|k| k.project_id).collect(),
                frequency,
            );
            let exists = backend.statement_exists(&query).await?;
            println!("{}", exists);
            workspace.close();
        }
        Command::Task { task_id } => {
            let state = backend.task_state(&task_id).await?;
            println!("{}", state);
        }
        Command::Simulations { target } => {
            let workspace = open(backend, &config, &target).await?;
            for key in workspace.simulations()? {
                println!("environment={} project={}", key.environment_id, key.project_id);
            }
            workspace.close();
        }
    }

    Ok(())
}

async fn open(backend: Arc<HttpBackend>, config: &TrackerConfig, target: &Target) -> anyhow::Result<Workspace> {
    let mut workspace = Workspace::with_backend(backend, config);
    workspace
        .load_environment(target.environment)
        .await
        .with_context(|| format!("loading environment {}", target.environment))?;
    workspace
        .load_group(target.group)
        .await
        .with_context(|| format!("loading project group {}", target.group))?;
    Ok(workspace)
}

/// Returns false if any task failed.
async fn run_statements(
    backend: Arc<HttpBackend>,
    config: &TrackerConfig,
    target: &Target,
    frequency: Frequency,
    overwrite: bool,
    lock: bool,
) -> anyhow::Result<bool> {
    let mut workspace = open(backend, config, target).await?;
    if lock {
        workspace.lock_environment().context("locking environment")?;
    }

    match workspace.create_statements(frequency, overwrite).await? {
        CreateOutcome::Existing => {
            println!("Statements already exist for frequency {}", frequency);
            workspace.close();
            return Ok(true);
        }
        CreateOutcome::Created { tasks, generation } => {
            info!(tasks, generation, "Statement creation accepted");
        }
    }

    let mut progress_rx = workspace.tracker().subscribe();
    let mut last = None;
    loop {
        let progress = progress_rx.borrow_and_update().clone();
        if last != Some((progress.complete, progress.failed)) {
            print_progress(&progress);
            last = Some((progress.complete, progress.failed));
        }
        if progress.is_settled() || progress_rx.changed().await.is_err() {
            break;
        }
    }
    workspace.tracker_mut().wait_idle().await;

    let progress = workspace.tracker().progress();
    for (project, complete) in &progress.per_project {
        println!("project {}: {}", project, if *complete { "complete" } else { "incomplete" });
    }
    for entry in workspace.tracker().matrix().entries() {
        if entry.status == TaskStatus::Failed {
            println!(
                "task {} (simulation {}, {}) failed: {}",
                entry.task_id,
                entry.simulation_id,
                entry.frequency,
                entry.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    workspace.close();
    Ok(progress.failed == 0)
}

fn print_progress(progress: &Progress) {
    println!(
        "{}/{} complete, {} failed",
        progress.complete, progress.expected, progress.failed
    );
}
