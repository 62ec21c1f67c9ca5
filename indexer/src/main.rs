//! Chain-following indexer CLI.
//!
//! Entry point for the indexer binary. Provides subcommands for:
//! - `run` - Start indexing every configured chain
//! - `migrate` - Apply the engine's own bootstrap migration
//! - `validate-config` - Parse and validate settings and trigger files, touching nothing
//! - `version` - Print version information

use std::sync::Arc;

use clap::{Parser, Subcommand};
use pdp_indexer::config::Settings;
use pdp_indexer::handlers;
use pdp_indexer::indexer::Ingestor;
use pdp_indexer::ports::SystemClock;
use pdp_indexer::registry::config::TriggerConfig;
use pdp_indexer::registry::TriggerRegistry;
use pdp_indexer::rpc::RpcClient;
use pdp_indexer::store::PostgresStore;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Chain-following indexer for storage-provider (Filecoin PDP) state.
#[derive(Parser, Debug)]
#[command(name = "pdp-indexer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Runtime environment, selects `config/{environment}.toml`
    #[arg(short, long, default_value = "development")]
    environment: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start indexing every configured chain
    Run,

    /// Apply the engine's own bootstrap migration
    Migrate,

    /// Parse and validate settings and trigger files without connecting to anything
    ValidateConfig {
        /// Path to a settings file to validate instead of the layered default
        #[arg(long)]
        file: Option<String>,
    },

    /// Show version information
    Version,
}

/// Initializes the global subscriber. Returns the `tracing-appender` worker
/// guard when file logging is configured; the caller must hold onto it for
/// the life of the process, since dropping it stops the background flush
/// thread.
fn init_logging(settings: Option<&Settings>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = settings.map_or_else(
        || tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        |s| tracing_subscriber::EnvFilter::try_new(&s.logging.level).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    );

    let json = settings.is_some_and(|s| s.logging.json);
    let file_path = settings.and_then(|s| s.logging.file_path.as_ref());

    let (writer, guard) = match file_path {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
            let filename = path.file_name().map_or_else(|| "indexer.log".into(), std::ffi::OsStr::to_os_string);
            let appender = tracing_appender::rolling::daily(dir, filename);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (non_blocking, Some(guard))
        }
        None => {
            let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());
            (non_blocking, Some(guard))
        }
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    guard
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            let _guard = init_logging(None);
            error!(%err, "fatal error");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> pdp_indexer::error::Result<()> {
    match cli.command {
        Commands::Version => {
            println!("pdp-indexer {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }

        Commands::ValidateConfig { file } => {
            let _guard = init_logging(None);
            let settings = match &file {
                Some(path) => Settings::from_file(path).map_err(|e| pdp_indexer::error::IndexerError::Config(e.to_string()))?,
                None => Settings::load(&cli.environment).map_err(|e| pdp_indexer::error::IndexerError::Config(e.to_string()))?,
            };

            if let Err(errors) = settings.validate() {
                for err in &errors {
                    error!(%err, "settings validation failed");
                }
                return Err(pdp_indexer::error::IndexerError::Config(format!("{} validation error(s)", errors.len())));
            }

            for chain in &settings.chains {
                let raw = std::fs::read_to_string(&chain.events_file_path).map_err(|e| {
                    pdp_indexer::error::IndexerError::Config(format!("chain {}: {}: {e}", chain.chain_id, chain.events_file_path.display()))
                })?;
                let config = TriggerConfig::from_yaml(&raw).map_err(|e| {
                    pdp_indexer::error::IndexerError::Config(format!("chain {}: invalid trigger config: {e}", chain.chain_id))
                })?;
                let registry = TriggerRegistry::build(&config)
                    .map_err(|e| pdp_indexer::error::IndexerError::Config(format!("chain {}: {e}", chain.chain_id)))?;
                info!(chain_id = chain.chain_id, bindings = registry.binding_count(), "trigger registry resolved");
            }

            info!("configuration is valid");
            Ok(())
        }

        Commands::Migrate => {
            let settings = Settings::load(&cli.environment).map_err(|e| pdp_indexer::error::IndexerError::Config(e.to_string()))?;
            let _guard = init_logging(Some(&settings));
            let pool = PgPoolOptions::new()
                .max_connections(settings.database.max_connections)
                .acquire_timeout(settings.database.connect_timeout())
                .connect(&settings.database.url)
                .await?;
            let store = PostgresStore::new(pool, Vec::new());
            store.run_migrations().await?;
            info!("migrations applied");
            Ok(())
        }

        Commands::Run => {
            let settings = Settings::load(&cli.environment).map_err(|e| pdp_indexer::error::IndexerError::Config(e.to_string()))?;
            let _guard = init_logging(Some(&settings));
            settings
                .validate()
                .map_err(|errors| pdp_indexer::error::IndexerError::Config(errors.join("; ")))?;

            let pool = PgPoolOptions::new()
                .max_connections(settings.database.max_connections)
                .acquire_timeout(settings.database.connect_timeout())
                .connect(&settings.database.url)
                .await?;

            let versioned_tables = vec!["proof_sets", "roots", "fault_records"];
            let store = PostgresStore::new(pool, versioned_tables);
            store.run_migrations().await?;

            let handler_registry = Arc::new(handlers::reference_registry());
            let shutdown = CancellationToken::new();

            let mut tasks = tokio::task::JoinSet::new();

            for chain in settings.chains.clone() {
                let raw = std::fs::read_to_string(&chain.events_file_path).map_err(|e| {
                    pdp_indexer::error::IndexerError::Config(format!("chain {}: {}: {e}", chain.chain_id, chain.events_file_path.display()))
                })?;
                let config = TriggerConfig::from_yaml(&raw)
                    .map_err(|e| pdp_indexer::error::IndexerError::Config(format!("chain {}: invalid trigger config: {e}", chain.chain_id)))?;
                let registry = Arc::new(
                    TriggerRegistry::build(&config).map_err(|e| pdp_indexer::error::IndexerError::Config(format!("chain {}: {e}", chain.chain_id)))?,
                );

                let rpc = Arc::new(RpcClient::new(chain.rpc_endpoint.clone())?);
                let processor = pdp_indexer::indexer::Processor::new(
                    store.pool().clone(),
                    Arc::clone(&registry),
                    Arc::clone(&handler_registry),
                    settings.worker_pool_size,
                );
                let ingestor = Ingestor::new(rpc, store.clone(), registry, processor, chain.clone(), SystemClock);
                let chain_shutdown = shutdown.clone();

                tasks.spawn(async move { ingestor.run(chain_shutdown.cancelled_owned()).await });
            }

            tokio::select! {
                () = shutdown_signal() => {
                    info!("shutdown signal received");
                    shutdown.cancel();
                }
                Some(result) = tasks.join_next() => {
                    if let Ok(Err(err)) = result {
                        error!(%err, "ingestor task exited");
                        shutdown.cancel();
                        tasks.abort_all();
                        return Err(err);
                    }
                }
            }

            // Give the in-flight ingestors a chance to observe cancellation
            // and return cleanly before the process exits.
            while tasks.join_next().await.is_some() {}

            Ok(())
        }
    }
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}
