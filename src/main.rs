use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::Parser;
use merchant_purge::{
    config::AppConfig,
    db::DbPool,
    jobs::{ArmOutcome, OneShotTrigger, ProductPurgeJob, PurgeError, PurgeRunResult, StopReason},
    notify, observability,
};
use tokio_util::sync::CancellationToken;

/// CLI arguments for merchant-purge
#[derive(Parser, Debug)]
#[command(version, about = "Bulk-delete a merchant's products and their images", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(short, long, global = true, default_value = "merchant-purge.toml")]
    config: PathBuf,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run the purge immediately (default)
    Run {
        /// Merchant whose products are deleted (overrides purge.owner_id)
        #[arg(long)]
        owner_id: Option<String>,
    },
    /// Schedule the purge once after the configured trigger delay
    Activate {
        /// Merchant whose products are deleted (overrides purge.owner_id)
        #[arg(long)]
        owner_id: Option<String>,
    },
    /// Run database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command.unwrap_or(Command::Run { owner_id: None }) {
        Command::Run { owner_id } => run_now(&args.config, owner_id).await,
        Command::Activate { owner_id } => run_activate(&args.config, owner_id).await,
        Command::Migrate => run_migrate(&args.config).await,
    }
}

/// Load config and initialize observability, exiting on failure.
fn load_config(path: &Path, owner_id: Option<String>) -> AppConfig {
    let config = match AppConfig::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", path.display(), e);
            std::process::exit(1);
        }
    };

    let config = match owner_id {
        Some(owner_id) => match config.with_owner_id(owner_id) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        None => config,
    };

    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = observability::metrics::init_metrics(&config.observability.metrics) {
        tracing::warn!(error = %e, "Failed to start metrics exporter, continuing without it");
    }

    tracing::info!(config_file = %path.display(), "Configuration loaded");
    config
}

async fn connect(config: &AppConfig) -> DbPool {
    let db = match DbPool::from_config(&config.database).await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to database");
            eprintln!("Error: Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if config.database.run_migrations()
        && let Err(e) = db.run_migrations().await
    {
        tracing::error!(error = %e, "Database migrations failed");
        eprintln!("Error: Database migrations failed: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = db.health_check().await {
        tracing::error!(error = %e, "Database health check failed");
        eprintln!("Error: Database health check failed: {}", e);
        std::process::exit(1);
    }

    db
}

fn build_job(db: &DbPool, config: &AppConfig) -> ProductPurgeJob {
    let notifier = match notify::build_notifier(&config.notification) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("Error: Failed to set up notifications: {}", e);
            std::process::exit(1);
        }
    };

    ProductPurgeJob::from_db(
        db,
        notifier,
        config.purge.clone(),
        config.notification.clone(),
    )
}

async fn run_now(config_path: &Path, owner_id: Option<String>) {
    let config = load_config(config_path, owner_id);
    let db = connect(&config).await;
    let job = build_job(&db, &config);

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    exit_with(job.run(&cancel).await);
}

async fn run_activate(config_path: &Path, owner_id: Option<String>) {
    let config = load_config(config_path, owner_id);
    let db = connect(&config).await;
    let job = Arc::new(build_job(&db, &config));

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let trigger = OneShotTrigger::with_schedule_lock(
        db.job_locks(),
        format!("{}:schedule", config.purge.lock_name),
    );
    let job_cancel = cancel.clone();
    let outcome = trigger
        .arm(config.trigger.delay(), cancel, move || async move {
            job.run(&job_cancel).await
        })
        .await;

    let handle = match outcome {
        Ok(ArmOutcome::Armed(handle)) => handle,
        Ok(ArmOutcome::AlreadyArmed | ArmOutcome::AlreadyFired) => {
            println!("Purge is already scheduled");
            return;
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to schedule purge");
            eprintln!("Error: Failed to schedule purge: {}", e);
            std::process::exit(1);
        }
    };

    match handle.await {
        Ok(Some(result)) => exit_with(result),
        Ok(None) => {
            tracing::info!("Activation cancelled before the purge started");
        }
        Err(e) => {
            tracing::error!(error = %e, "Purge task failed");
            eprintln!("Error: Purge task failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn exit_with(result: Result<PurgeRunResult, PurgeError>) {
    match result {
        Ok(result) => {
            let verb = match result.stop_reason {
                StopReason::Completed => "completed",
                StopReason::Cancelled => "cancelled",
            };
            println!(
                "Purge {}: {} batches, {} products deleted ({} failed), {} images deleted ({} failed)",
                verb,
                result.batches,
                result.products_deleted,
                result.products_failed,
                result.attachments_deleted,
                result.attachments_failed,
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "Purge failed");
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run_migrate(config_path: &Path) {
    let config = load_config(config_path, None);

    tracing::info!(
        config_file = %config_path.display(),
        "Running database migrations"
    );

    match DbPool::from_config(&config.database).await {
        Ok(pool) => match pool.run_migrations().await {
            Ok(()) => {
                tracing::info!("Database migrations completed successfully");
            }
            Err(e) => {
                tracing::error!(error = %e, "Database migrations failed");
                eprintln!("Error: Database migrations failed: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to database");
            eprintln!("Error: Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    }
}

/// Cancel `cancel` on Ctrl+C or SIGTERM.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping after the current batch");
    cancel.cancel();
}
