// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sloth Runner master daemon (slothd).
//!
//! Background process that owns the store and serves the registry
//! protocol. Architecture:
//! - Listener task: accepts connections, one spawned handler each
//! - Background tasks: store checkpointer, agent reachability sweep,
//!   hook queue drain
//! - Main task: waits for shutdown (signal or RPC) and finalises

use sloth_core::{SystemClock, NullScriptRuntime};
use sloth_engine::{Runner, RunnerDeps, StackManager, StoreResolver, TcpAgentChannel};
use sloth_master::{
    config::Config,
    env,
    hooks,
    lifecycle::{self, LifecycleError},
    listener::{Listener, MasterCtx},
    registry::Registry,
    startup,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle info flags before any config/lock acquisition
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("slothd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("slothd {}", env!("CARGO_PKG_VERSION"));
                println!("Sloth Runner master daemon");
                println!();
                println!("USAGE:");
                println!("    slothd");
                println!();
                println!("The master is typically started by the `sloth` CLI and should");
                println!("not be invoked directly. It listens on TCP for agents and CLI");
                println!("commands (SLOTH_MASTER_ADDR, default {}).", env::DEFAULT_LISTEN_ADDR);
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: slothd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load().ok_or(LifecycleError::NoDataDir)?;

    rotate_log_if_needed(&config.log_path);
    let _log_guard = setup_logging(&config)?;

    info!("starting master daemon");

    let daemon = match startup(&config) {
        Ok(daemon) => daemon,
        Err(LifecycleError::LockFailed(path)) => {
            let pid = std::fs::read_to_string(&config.lock_path)
                .unwrap_or_default()
                .trim()
                .to_string();
            eprintln!("slothd is already running (lock: {path})");
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            std::process::exit(1);
        }
        Err(e) => {
            error!("failed to start master: {}", e);
            return Err(e.into());
        }
    };

    let shutdown_notify = Arc::new(Notify::new());
    let run_cancel = CancellationToken::new();
    let background_cancel = CancellationToken::new();

    let store = Arc::clone(&daemon.store);
    let clock = SystemClock;
    let deps = RunnerDeps {
        script: Arc::new(NullScriptRuntime::new()),
        resolver: Arc::new(StoreResolver::new(Arc::clone(&store))),
        channel: Arc::new(TcpAgentChannel::new()),
    };
    let runner =
        Runner::new(StackManager::new(Arc::clone(&store), clock.clone()), deps, clock.clone());

    let ctx = Arc::new(MasterCtx {
        store: Arc::clone(&store),
        registry: Registry::new(Arc::clone(&store), clock.clone()),
        runner,
        config: config.clone(),
        start_time: Instant::now(),
        shutdown: Arc::clone(&shutdown_notify),
        run_cancel: run_cancel.clone(),
    });

    let tcp = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(listen = %config.listen_addr, "master ready");
    tokio::spawn(Listener::new(tcp, Arc::clone(&ctx)).run());

    spawn_checkpoint(Arc::clone(&store), background_cancel.clone());
    spawn_sweep(Arc::clone(&ctx), background_cancel.clone());
    tokio::spawn(hooks::drain_loop(
        Arc::clone(&store),
        clock.clone(),
        env::hook_drain_interval(),
        background_cancel.clone(),
    ));

    // Signal ready for parent process (CLI waiting for startup)
    println!("READY");

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = shutdown_notify.notified() => info!("shutdown requested via command"),
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    // Cancel in-flight runs and give them a moment to finalise their
    // stacks; whatever is still running gets finalised as interrupted.
    run_cancel.cancel();
    background_cancel.cancel();
    tokio::time::sleep(Duration::from_millis(500)).await;
    match lifecycle::finalize_interrupted(&store, &clock, "interrupted") {
        Ok(0) => {}
        Ok(count) => info!(count, "finalised interrupted runs"),
        Err(e) => error!("failed to finalise interrupted runs: {}", e),
    }

    if let Err(e) = store.checkpoint() {
        error!("final checkpoint failed: {}", e);
    }
    info!("master stopped");
    Ok(())
}

/// Checkpoint interval (60 seconds)
const CHECKPOINT_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn a task that periodically snapshots the store and truncates the
/// WAL. The store's checkpoint is blocking (fsync), so it runs on the
/// blocking pool.
fn spawn_checkpoint(store: Arc<sloth_storage::Store>, cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CHECKPOINT_INTERVAL);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = cancel.cancelled() => return,
            }
            let store = Arc::clone(&store);
            let result = tokio::task::spawn_blocking(move || store.checkpoint()).await;
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "checkpoint failed"),
                Err(e) => tracing::warn!(error = %e, "checkpoint task panicked"),
            }
        }
    });
}

/// Spawn the agent reachability sweep.
fn spawn_sweep(ctx: Arc<MasterCtx>, cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(env::sweep_interval());
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = cancel.cancelled() => return,
            }
            match ctx.registry.sweep() {
                Ok(flipped) if !flipped.is_empty() => {
                    info!(agents = ?flipped, "sweep marked stale agents inactive")
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "sweep failed"),
            }
        }
    });
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep.
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the daemon log file if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `master.log` into `.1`/`.2`/`.3`, deleting the oldest.
/// Best-effort: rotation failures must not stop the daemon.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let _ = std::fs::rename(format!("{log_str}.{i}"), format!("{log_str}.{}", i + 1));
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_appender = tracing_appender::rolling::never(
        config.log_path.parent().ok_or(LifecycleError::NoDataDir)?,
        config.log_path.file_name().ok_or(LifecycleError::NoDataDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
