use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use nntc_schedule::config::Config;
use nntc_schedule::db::ScheduleStore;
use nntc_schedule::ingest::scheduler::{run_scheduler, stop_scheduler};
use nntc_schedule::ingest::{exit_status, CycleOutcome, IngestPipeline};
use nntc_schedule::server::create_router;
use nntc_schedule::types::AppState;

/// How long an in-flight cycle may keep running after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "nntc_schedule")]
#[command(about = "NNTC schedule ingestion and query service", long_about = None)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, short, env = "NNTC_SCHEDULE_CONFIG", default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll for schedule updates and serve the query API
    Serve,
    /// Run a single ingestion cycle and exit (0 = updated or unchanged)
    Update,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async {
        let config = load_config(&cli.config)?;
        match cli.command {
            Commands::Serve => serve(config).await,
            Commands::Update => update(config).await,
        }
    });

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: &PathBuf) -> Result<Config> {
    let config = Config::load(path)?;
    config.validate()?;
    info!(path = %path.display(), source = %config.source_url, "Loaded configuration");
    Ok(config)
}

fn build_pipeline(config: &Config) -> Result<Arc<IngestPipeline>> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating {}", config.data_dir.display()))?;
    let store = Arc::new(ScheduleStore::open(&config.database_path)?);
    Ok(Arc::new(IngestPipeline::from_config(config, store)?))
}

async fn update(config: Config) -> Result<ExitCode> {
    let pipeline = build_pipeline(&config)?;

    let result = pipeline.run_cycle().await;
    match &result {
        Ok(CycleOutcome::Unchanged { .. }) => {
            info!("Manual update finished, schedule unchanged");
        }
        Ok(CycleOutcome::Updated(report)) => {
            info!(records = report.records, "Manual update finished");
        }
        // Already logged by the pipeline
        Err(_) => {}
    }

    Ok(ExitCode::from(exit_status(&result)))
}

async fn serve(config: Config) -> Result<ExitCode> {
    let pipeline = build_pipeline(&config)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = tokio::spawn(run_scheduler(
        pipeline.clone(),
        config.poll_interval(),
        shutdown_rx.clone(),
    ));

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!(address = %address, "Query API listening");

    let mut server_shutdown = shutdown_rx.clone();
    let router = create_router(Arc::new(AppState::with_pipeline(pipeline)));
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.wait_for(|stop| *stop).await;
            })
            .await
    });

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutdown requested");
    let _ = shutdown_tx.send(true);

    stop_scheduler(scheduler, SHUTDOWN_GRACE).await;

    server.await??;
    info!("Shutdown complete");
    Ok(ExitCode::SUCCESS)
}
