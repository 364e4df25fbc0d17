//! hedwig-web: JSON service for proposal records and review summaries

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use hedwig_common::auth::load_shared_secret;
use hedwig_common::config::{
    CompiledDefaults, LoggingConfig, RootFolderInitializer, RootFolderResolver, TomlConfig,
};
use hedwig_common::db::init_database;
use hedwig_common::types::FacilityKind;
use hedwig_web::{build_router, AppState};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "hedwig-web", version, about = "Hedwig proposal records service")]
struct Args {
    /// Folder holding hedwig.db
    #[arg(long, env = "HEDWIG_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "HEDWIG_BIND")]
    bind: Option<String>,

    #[arg(long, env = "HEDWIG_PORT")]
    port: Option<u16>,

    /// Facility rules to apply (generic or jcmt)
    #[arg(long, env = "HEDWIG_FACILITY")]
    facility: Option<String>,
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    // RUST_LOG takes precedence over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load_or_default();
    let defaults = CompiledDefaults::for_current_platform();

    init_tracing(&config.logging)?;

    info!(
        "Starting hedwig-web v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let facility: FacilityKind = args
        .facility
        .as_deref()
        .or(config.facility.as_deref())
        .map(str::parse)
        .transpose()?
        .unwrap_or_default();
    info!("Facility: {}", facility.code());

    let root_folder = RootFolderResolver::new("hedwig-web")
        .with_cli_arg(args.root_folder)
        .with_config(config.clone())
        .resolve();

    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory_exists()?;

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let shared_secret = load_shared_secret(&pool).await?;
    if shared_secret == 0 {
        info!("API request signing disabled (shared secret is 0)");
    } else {
        info!("Loaded shared secret for API request signing");
    }

    let state = AppState::new(pool, shared_secret, facility);
    let app = build_router(state);

    let bind = args
        .bind
        .or(config.bind_address)
        .unwrap_or(defaults.bind_address);
    let port = args.port.or(config.port).unwrap_or(defaults.port);
    let address = format!("{}:{}", bind, port);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("hedwig-web listening on http://{}", address);
    info!("Health check: http://{}/health", address);

    axum::serve(listener, app).await?;

    Ok(())
}
