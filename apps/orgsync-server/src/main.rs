//! orgsync server
//!
//! Long-lived daemon that reconciles a declarative description of a
//! GitHub organization against its live state: periodic reconciliation,
//! webhook and REST triggers, health probes, and read-only projections of
//! the declared state.

mod config;
mod logging;
mod routes;
mod scheduler;
mod service;
mod source;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::signal;

use orgsync_engine::{Executor, RecordingExecutor};

use crate::config::Settings;
use crate::routes::AppState;
use crate::scheduler::{ApplyScheduler, LogNotifier};
use crate::service::SyncService;
use crate::source::{YamlLiveSource, YamlSource};

#[derive(Parser)]
#[command(name = "orgsync-server", about = "GitHub organization reconciliation daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon: periodic reconciliation plus the REST and webhook
    /// surface.
    Serve,
    /// Run one reconciliation and print the applied operations.
    Apply,
    /// Compute the reconciliation plan without applying anything.
    Plan,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    logging::init_logging(&settings.log_filter);

    match cli.command {
        Command::Serve => serve(settings).await,
        Command::Apply => run_once(&settings, settings.dryrun),
        Command::Plan => run_once(&settings, true),
    }
}

fn build_service(
    settings: &Settings,
    executor: Option<Arc<dyn Executor + Send + Sync>>,
    dryrun: bool,
) -> SyncService {
    SyncService::new(
        Box::new(YamlSource::new(settings.source_path.clone())),
        Box::new(YamlLiveSource::new(settings.live_path.clone())),
        executor,
        settings.teams_repo.clone(),
        dryrun,
    )
}

/// One-shot reconciliation for the `apply` and `plan` subcommands; the
/// recorded operations go to stdout as JSON lines.
fn run_once(settings: &Settings, dryrun: bool) {
    let recorder = Arc::new(RecordingExecutor::new());
    let executor: Arc<dyn Executor + Send + Sync> = recorder.clone();
    let service = build_service(settings, Some(executor), dryrun);

    if let Err(e) = service.apply(true, "cli") {
        tracing::error!(error = %e, "Reconciliation failed");
        std::process::exit(1);
    }

    for operation in recorder.operations() {
        match serde_json::to_string(&operation) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize operation"),
        }
    }
}

async fn serve(settings: Settings) {
    let service = Arc::new(build_service(&settings, None, settings.dryrun));

    let scheduler = {
        let service = Arc::clone(&service);
        Arc::new(ApplyScheduler::new(
            Box::new(move |force, author| service.apply(force, author)),
            Box::new(LogNotifier),
            settings.apply_interval_secs,
        ))
    };

    let stop = Arc::new(AtomicBool::new(false));
    let ticker = {
        let scheduler = Arc::clone(&scheduler);
        let stop = Arc::clone(&stop);
        std::thread::spawn(move || scheduler.run_ticker(&stop))
    };

    let app = routes::api_router(AppState { service, scheduler });

    let listener = match tokio::net::TcpListener::bind((settings.host.as_str(), settings.port)).await
    {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Failed to bind {}:{}: {e}", settings.host, settings.port);
            std::process::exit(1);
        }
    };

    tracing::info!(
        host = %settings.host,
        port = settings.port,
        interval = settings.apply_interval_secs,
        dryrun = settings.dryrun,
        "orgsync server started"
    );

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
    }

    // Stop the ticker; an in-flight reconciliation finishes first.
    stop.store(true, Ordering::Relaxed);
    if ticker.join().is_err() {
        tracing::warn!("Apply ticker panicked");
    }

    tracing::info!("orgsync server stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping orgsync");
}
