//! tokenq queue server.
//!
//! Serves the queue API, runs the periodic assignment scheduler, and
//! delivers SMS updates through the configured provider.

use std::sync::Arc;

use anyhow::Result;
use tokenq_fairness::{FairnessPolicy, ServingDeadline};
use tokenq_server::{
    api, config,
    notify::{LogNotifier, Notifier, TwilioNotifier},
    queue::{Scheduler, SchedulerWorker},
    state::AppState,
    store::{MemoryStore, PgStore, QueueStore},
};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = config::Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to TOKENQ_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting tokenq queue server");
    info!(listen_addr = %config.listen_addr, "Configuration loaded");

    // Pick the store: in-memory in dev mode, Postgres otherwise
    let store: Arc<dyn QueueStore> = if config.dev_mode {
        info!("Dev mode: using in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        let pg = match PgStore::connect(&config.database).await {
            Ok(pg) => pg,
            Err(e) => {
                error!(error = %e, "Failed to connect to database");
                return Err(e.into());
            }
        };
        pg.run_migrations().await?;
        Arc::new(pg)
    };

    let policy = FairnessPolicy::new(config.queue.fairness_threshold);
    let deadline = ServingDeadline::from_secs(config.queue.max_serving_time_secs);
    let scheduler = Arc::new(Scheduler::new(store.clone(), policy, deadline));

    let notifier: Arc<dyn Notifier> = if config.sms.enabled {
        Arc::new(TwilioNotifier::new(config.sms.clone()))
    } else {
        Arc::new(LogNotifier)
    };

    // Create shutdown channel for graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start the scheduler worker in the background
    let worker = SchedulerWorker::new(scheduler.clone(), config.queue.auto_assign_interval);
    let worker_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            worker.run(shutdown_rx).await;
        }
    });

    // Create application state
    let state = AppState::new(
        store,
        scheduler,
        notifier,
        config.queue.per_token_minutes,
    );

    // Build and run the server
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut shutdown_rx = shutdown_rx;
                loop {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
    });

    // Wait for shutdown signal (Ctrl+C)
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = server_handle => {
            match result {
                Ok(Ok(())) => info!("Server exited normally"),
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
        }
    }

    // Signal shutdown to the worker
    let _ = shutdown_tx.send(true);

    info!("Waiting for scheduler worker to shut down...");
    let shutdown_timeout = std::time::Duration::from_secs(10);
    if let Err(e) = tokio::time::timeout(shutdown_timeout, worker_handle).await {
        warn!(error = %e, "Scheduler worker did not shut down in time");
    }

    info!("Queue server shutdown complete");
    Ok(())
}
