use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

mod catalog;
mod config;
mod db;
mod error;
mod llm;
mod pipeline;
mod store;
mod util;
mod web;

use crate::config::{AppConfig, CliArgs};
use crate::db::bootstrap::{ensure_schema, seed_demo_data};
use crate::db::db_pool::build_pool;
use crate::llm::LlmManager;
use crate::pipeline::executor::QueryExecutor;
use crate::pipeline::QueryService;
use crate::store::{ActivityLog, ListLimits, QueryStore};
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = CliArgs::parse();

    // Initialize logging
    init_tracing(args.log_json);

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!(
        "Initializing DuckDB connection pool for {}",
        config.database.connection_string
    );
    let pool_size = u32::try_from(config.database.pool_size).unwrap_or(u32::MAX);
    let pool = build_pool(&config.database.connection_string, pool_size)?;

    ensure_schema(&pool).await?;
    if args.seed_demo {
        seed_demo_data(&pool).await?;
    }

    // Initialize LLM manager
    info!("Initializing LLM manager with backend: {}", config.llm.backend);
    let llm_manager = LlmManager::new(&config.llm)?;

    let limits = ListLimits::from(&config.query);
    let service = QueryService::new(
        llm_manager,
        QueryStore::new(pool.clone(), limits),
        ActivityLog::new(pool.clone(), limits),
        QueryExecutor::new(pool, config.query.execution_timeout()),
    );
    let app_state = Arc::new(AppState::new(config.clone(), service));

    // Start the web server
    info!("Starting DataFlow server on {}:{}", config.web.host, config.web.port);
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
