//! # urlvet server binary
//!
//! Startup order mirrors the request path: configuration, database,
//! provider client, resolver, background worker, then the HTTP router.
//! `db preflight` and `db migrate` subcommands exercise the database
//! steps in isolation for deploy pipelines.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use urlvet_config::{Config, ConfigLoad, ConfigLoader};
use urlvet_core::{
    PostgresScanStore, PostgresUserStore, ScanMetrics, ScanResolver, ScanStore, ScanWorker,
    UrlscanClient, UrlscanConfig, UserStore, WorkerConfig,
};
use urlvet_server::{build_router, AppState};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "urlvet-server")]
#[command(about = "URL security scanning service with asynchronous provider submission")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct ServeArgs {
    /// Server port (overrides config)
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(subcommand)]
    Db(DbCommand),
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Check database connectivity and exit
    Preflight,
    /// Apply the database schema and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(command) = cli.command {
        match command {
            Command::Db(DbCommand::Preflight) => {
                run_db_preflight(&cli.serve).await?;
                return Ok(());
            }
            Command::Db(DbCommand::Migrate) => {
                run_db_migrate(&cli.serve).await?;
                return Ok(());
            }
        }
    }

    run_server(cli.serve).await
}

async fn run_db_preflight(args: &ServeArgs) -> anyhow::Result<()> {
    let ConfigBootstrap { database_url, .. } = load_runtime_config(args)?;
    let store = PostgresScanStore::connect(&database_url)
        .await
        .context("failed to connect to PostgreSQL for preflight")?;
    store
        .health_check()
        .await
        .context("database preflight failed")?;
    info!("Database preflight passed");
    Ok(())
}

async fn run_db_migrate(args: &ServeArgs) -> anyhow::Result<()> {
    let ConfigBootstrap { database_url, .. } = load_runtime_config(args)?;
    let store = PostgresScanStore::connect(&database_url)
        .await
        .context("failed to connect to PostgreSQL for migration")?;
    store
        .initialize_schema()
        .await
        .context("database migration failed")?;
    info!("Database schema applied successfully");
    Ok(())
}

struct ConfigBootstrap {
    config: Arc<Config>,
    database_url: String,
}

fn load_runtime_config(args: &ServeArgs) -> anyhow::Result<ConfigBootstrap> {
    let env_file_loaded = dotenvy::dotenv().is_ok();

    let ConfigLoad {
        mut config,
        warnings,
    } = ConfigLoader::new()
        .load()
        .context("failed to load configuration")?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host.clone() {
        config.server.host = host;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if env_file_loaded {
        info!("loaded .env file");
    }

    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    info!(
        worker.submission_delay_ms = config.worker.submission_delay_ms,
        worker.result_delay_ms = config.worker.result_delay_ms,
        worker.submission_batch_size = config.worker.submission_batch_size,
        worker.per_user_batch_size = config.worker.per_user_batch_size,
        cache.ttl_hours = config.cache.ttl_hours,
        "worker configuration in effect"
    );

    let database_url = config
        .database
        .url
        .clone()
        .context("DATABASE_URL must be provided for PostgreSQL connections")?;

    if !(database_url.starts_with("postgres://") || database_url.starts_with("postgresql://")) {
        anyhow::bail!("Invalid database URL: must start with postgres:// or postgresql://");
    }

    Ok(ConfigBootstrap {
        config: Arc::new(config),
        database_url,
    })
}

struct ResourceBootstrap {
    state: AppState,
    worker: Arc<ScanWorker>,
}

async fn wire_app_resources(
    config: Arc<Config>,
    database_url: &str,
) -> anyhow::Result<ResourceBootstrap> {
    let scan_store = PostgresScanStore::connect(database_url)
        .await
        .context("database connection failed")?;
    scan_store
        .health_check()
        .await
        .context("database health check failed")?;
    scan_store
        .initialize_schema()
        .await
        .context("database schema initialization failed")?;
    info!("Successfully connected to PostgreSQL");

    let user_store = PostgresUserStore::new(scan_store.pool().clone());

    let provider = UrlscanClient::new(UrlscanConfig {
        base_url: config.provider.base_url.clone(),
        api_key: config.provider.api_key.clone(),
        max_retries: config.provider.max_retries,
        retry_initial_delay: Duration::from_millis(config.provider.retry_initial_delay_ms),
        connect_timeout: Duration::from_secs(config.provider.connect_timeout_secs),
        request_timeout: Duration::from_secs(config.provider.request_timeout_secs),
    })
    .context("failed to build provider client")?;

    let scans: Arc<dyn ScanStore> = Arc::new(scan_store);
    let users: Arc<dyn UserStore> = Arc::new(user_store);
    let metrics = Arc::new(ScanMetrics::new());

    let resolver = Arc::new(ScanResolver::new(
        scans.clone(),
        metrics.clone(),
        chrono::Duration::hours(i64::from(config.cache.ttl_hours)),
    ));

    let worker = Arc::new(ScanWorker::new(
        scans.clone(),
        Arc::new(provider),
        metrics.clone(),
        WorkerConfig {
            submission_interval: Duration::from_millis(config.worker.submission_delay_ms),
            result_interval: Duration::from_millis(config.worker.result_delay_ms),
            submission_batch_size: config.worker.submission_batch_size,
            result_batch_size: config.worker.result_batch_size,
            per_owner_batch_size: config.worker.per_user_batch_size,
        },
    ));

    let state = AppState {
        scans,
        users,
        resolver,
        metrics,
        config,
    };

    Ok(ResourceBootstrap { state, worker })
}

async fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    let ConfigBootstrap {
        config,
        database_url,
    } = load_runtime_config(&args)?;

    let ResourceBootstrap { state, worker } =
        wire_app_resources(config.clone(), &database_url).await?;

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server host/port")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // Stop scheduling further passes; in-flight provider calls respect
    // their own timeouts.
    let _ = shutdown_tx.send(()).await;
    let _ = worker_handle.await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
}
