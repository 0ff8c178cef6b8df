//! Composition root for the Mimir AIP pipeline execution substrate.
//!
//! Wires the registry (with the demonstration plugin set), the file-backed
//! pipeline store, the engine, the cron scheduler, the job queue, and the
//! MCP tool adapter into a single axum server, then serves `/api/v1` plus
//! the unversioned health and MCP endpoints until the process receives a
//! shutdown signal.

use mimir_core::event::EventBus;
use mimir_core::pipeline::Engine;
use mimir_core::registry::Registry;
use mimir_http::{build_router, AppState, HttpConfig};
use mimir_mcp::{McpAdapter, NullExternalToolBackend};
use mimir_queue::JobQueue;
use mimir_scheduler::Scheduler;
use mimir_store::Store;
use std::process;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = run().await {
        error!("server exited with error: {e}");
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = HttpConfig::from_env();

    let engine_bus = EventBus::new();
    let registry = Arc::new(Registry::with_bus(engine_bus.clone()));
    mimir_plugins_builtin::register_all(&registry)?;
    info!(types = ?registry.types(), "registered built-in plugins");

    let store = Arc::new(Store::open(config.pipeline_dir.clone()).await?);
    let engine = Arc::new(Engine::new(registry.clone(), engine_bus));
    let scheduler = Arc::new(Scheduler::new(
        store.clone(),
        engine.clone(),
        EventBus::new(),
        config.scheduler_timezone,
        config.scheduler_max_concurrent,
    ));
    let queue = Arc::new(JobQueue::new(
        store.clone(),
        engine.clone(),
        EventBus::new(),
        config.job_queue_capacity,
        config.job_workers,
        config.job_result_ttl,
    ));
    let mcp = Arc::new(McpAdapter::new(
        registry.clone(),
        engine.clone(),
        store.clone(),
        scheduler.clone(),
        queue.clone(),
        Arc::new(NullExternalToolBackend),
    ));

    let scheduler_handle = scheduler.start();
    let (queue_dispatcher, queue_reaper) = queue.start();

    let state = AppState {
        store,
        engine,
        registry,
        scheduler: scheduler.clone(),
        queue: queue.clone(),
        mcp,
        config: config.clone(),
    };
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    info!(address = %config.bind_address, "mimir-server listening");

    axum::serve(listener, router.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down background workers");
    scheduler.shutdown();
    queue.shutdown();
    scheduler_handle.abort();
    queue_dispatcher.abort();
    queue_reaper.abort();

    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM — whichever arrives first.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
