use dbstrap::{Config, DbModule, db::PgDriver, utils::logging::init_logging};
use mimalloc::MiMalloc;
use tokio::signal;
use tracing::{error, info};
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cfg = Config::load()?;
    let _log_guards = init_logging(&cfg.logging)?;

    info!(
        backoff_ms = cfg.db.backoff_ms,
        probe_port = cfg.db.probe.port,
        probe_scheme = %cfg.db.probe.scheme,
        tls = cfg.db.options.ssl.is_some(),
        max_connections = cfg.db.options.max_connections,
        "DB bootstrap config loaded"
    );

    let module = DbModule::builder(cfg.db.clone(), PgDriver).spawn().await?;
    if let Err(e) = module.init().await {
        error!(error = %e, "DB initialization failed");
        module.shutdown().await;
        return Err(e.into());
    }

    match module.status().await {
        Ok(status) => info!(state = ?status.state, host = ?status.host, "DB bootstrap running"),
        Err(e) => error!(error = %e, "DB bootstrap status unavailable"),
    }

    shutdown_signal().await;
    info!("Shutting down DB bootstrap...");
    module.shutdown().await;
    info!("DB bootstrap has shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
