//! netdiag daemon - Main Entry Point
//! JSON-RPC server in front of an admission-controlled subprocess executor

mod config;

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{DaemonConfig, LogFormat, ENV_ALLOWLIST};
use netdiag_api_rpc::RpcServer;
use netdiag_core::application::{AdmissionQueue, DiagnosticService};
use netdiag_core::domain::PrivilegePolicy;
use netdiag_core::port::time_provider::SystemTimeProvider;
use netdiag_infra_system::SubprocessExecutor;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration
    let config = DaemonConfig::from_env()?;

    // 2. Initialize logging
    init_logging(config.log_format)?;
    info!("netdiag daemon v{} starting...", VERSION);
    info!(
        max_concurrency = config.admission.max_concurrency,
        max_pending = ?config.admission.max_pending,
        command_timeout_ms = config.admission.command_timeout.as_millis() as u64,
        "Admission configured"
    );

    // 3. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let executor = Arc::new(
        SubprocessExecutor::new(
            time_provider,
            ENV_ALLOWLIST.iter().map(|k| k.to_string()).collect(),
        )
        .with_kill_grace(config.admission.kill_grace),
    );

    let queue = AdmissionQueue::new(executor, config.admission.clone())?;
    let service = Arc::new(DiagnosticService::new(
        queue.clone(),
        PrivilegePolicy::default(),
    ));

    // 4. Start JSON-RPC server
    let rpc_server = RpcServer::new(config.rpc.clone(), service);
    let (addr, rpc_handle) = rpc_server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!(addr = %addr, "System ready. Waiting for requests...");

    // 5. Wait for shutdown signal
    wait_for_signal().await?;
    info!("Shutdown signal received. Draining in-flight commands...");

    // 6. Graceful shutdown: stop accepting, then let the queue drain
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;

    match tokio::time::timeout(config.shutdown_timeout, queue.wait_idle()).await {
        Ok(()) => {
            info!("Shutdown complete.");
            Ok(())
        }
        Err(_) => {
            let stats = queue.stats();
            error!(
                active = stats.active,
                pending = stats.pending,
                "Could not finish in-flight commands in time, forcefully shutting down"
            );
            std::process::exit(1);
        }
    }
}

fn init_logging(format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("netdiag=info"))?;

    match format {
        LogFormat::Json => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
    Ok(())
}

/// Resolve on Ctrl+C, or SIGTERM on unix
async fn wait_for_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res?,
            _ = terminate.recv() => warn!("SIGTERM received"),
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok(())
    }
}
