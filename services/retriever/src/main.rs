//! Plume retriever
//!
//! Retrieves a methane column-enhancement raster over a point source from a
//! local scene archive.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use imagery::LocalSceneArchive;
use inversion::LayeredBeerLambert;
use retriever::{write_outputs, ConfigOverrides, Pipeline, RetrieverConfig};

/// Methane plume retriever
#[derive(Parser, Debug)]
#[command(name = "plume-retriever")]
#[command(about = "Retrieve methane column enhancement over a point source (MBSP)")]
struct Args {
    /// Retriever configuration file (YAML)
    #[arg(short, long, env = "PLUME_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "PLUME_JSON_LOGS")]
    json_logs: bool,

    /// Number of runtime worker threads
    #[arg(long, env = "PLUME_WORKER_THREADS")]
    worker_threads: Option<usize>,
}

fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args);

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    }

    let result = runtime_builder
        .build()
        .context("Failed to create Tokio runtime")
        .and_then(|runtime| runtime.block_on(run(args)));

    if let Err(e) = result {
        error!("plume-retriever exiting: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true);

    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(args: Args) -> Result<()> {
    let config = RetrieverConfig::resolve(args.config.as_deref(), &args.overrides)?;

    info!(
        lon = config.source.lon,
        lat = config.source.lat,
        plume_date = %config.plume_date,
        reference_date = ?config.reference_date,
        instrument = %config.inversion.instrument,
        method = %config.inversion.method,
        workers = config.dispatch.workers,
        "Starting plume retrieval"
    );

    let archive = LocalSceneArchive::open(&config.imagery.archive)
        .await
        .with_context(|| format!("Failed to open scene archive {:?}", config.imagery.archive))?;

    let pipeline = Pipeline::new(Arc::new(archive), Arc::new(LayeredBeerLambert));
    let run = pipeline.run(&config).await.context("Retrieval failed")?;
    let files = write_outputs(&config.output_dir, &run, &config.inversion)?;

    let report = &run.report;
    info!(
        signal = %files.signal.display(),
        concentration = %files.concentration.display(),
        inverted = report.inverted,
        masked = report.masked,
        failed = report.failed,
        unprocessed = report.unprocessed,
        incomplete = report.incomplete,
        "Retrieval written"
    );

    Ok(())
}
