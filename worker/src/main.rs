use anyhow::Result;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use worker::{StopReason, Worker, WorkerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("worker=debug,reqwest=info")),
        )
        .init();

    let cfg = WorkerConfig::from_env();
    info!(
        "worker con app `{}` sobre {} contra {}",
        cfg.app,
        cfg.store_dir.display(),
        cfg.coordinator_url
    );
    let w = Worker::from_config(&cfg)?;

    // Nombre de host (solo para info)
    let hostname = hostname::get()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    // ctrl-c: se termina la tarea en curso y se deja de pedir
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("ctrl-c: el worker sale después de la tarea actual");
            let _ = stop_tx.send(true);
        }
    });

    match w.run(&hostname, stop_rx).await? {
        StopReason::Exit => info!("job terminado, saliendo"),
        StopReason::CoordinatorGone => warn!("el coordinador no responde, saliendo"),
        StopReason::Interrupted => info!("interrumpido, saliendo"),
    }
    Ok(())
}
