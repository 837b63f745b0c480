/*
newsdesk - single-binary main.rs
Serves the control surface and runs the curation pipeline in the background of the same process.
*/

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use common::init_db_pool;
use newsdesk::app;
use newsdesk::runner::PipelineRunner;
use newsdesk::server::{launch_rocket, AppState};
use newsdesk::storage::{ensure_schema, DocumentStore, SqliteDocumentStore};

#[derive(Parser, Debug)]
#[command(name = "newsdesk", about = "Newsdesk headline curation server")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Run the pipeline once and exit (do not bind HTTP server)
    #[arg(long)]
    run_once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // API keys usually live in .env
    dotenv::dotenv().ok();

    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = match app::load_config(args.config).await {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            return Err(e);
        }
    };

    let db_path = app::resolve_db_path(config.database.path()).await;
    info!(db_path = %db_path, "resolved DB path");
    let db_pool = match init_db_pool(&db_path).await {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, db_path = %db_path, "failed to initialize database pool");
            return Err(e);
        }
    };
    ensure_schema(&db_pool).await?;
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::new(db_pool));

    let pipeline = match app::build_pipeline(&config, store.clone()) {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "failed to set up pipeline");
            return Err(e);
        }
    };
    let runner = PipelineRunner::new(Arc::new(pipeline));

    if args.run_once {
        info!("Starting in run-once mode");
        if let Some(report) = runner.run_now().await {
            info!(
                run_id = %report.run_id,
                candidates = report.candidates,
                persisted = report.persisted,
                failed = report.failed,
                "run-once finished"
            );
        }
        return Ok(());
    }

    let state = AppState::new(runner, store, config.pipeline.latest_limit());
    info!(bind = config.server.bind(), port = config.server.port(), "starting HTTP server");
    launch_rocket(state, config.server.bind(), config.server.port()).await
}
