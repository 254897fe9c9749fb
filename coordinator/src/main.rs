use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use glob::glob;
use itertools::Itertools;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::DEFAULT_LEASE_SECS;
use coordinator::{build_router, monitor, AppState, JobState};

/// Coordinador de un job MapReduce: una tarea map por archivo de entrada y
/// `reduce_tasks` tareas reduce.
#[derive(Parser, Debug)]
#[command(name = "coordinator", version)]
struct Args {
    /// Archivos de entrada o patrones glob (`pg-*.txt`). Sin entradas el job
    /// solo tiene reduces, que escriben salidas vacías.
    inputs: Vec<String>,

    #[arg(long, env = "COORDINATOR_ADDR", default_value = "0.0.0.0:8080")]
    addr: String,

    #[arg(
        short = 'r',
        long,
        env = "REDUCE_TASKS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    reduce_tasks: u32,

    /// Segundos sin contacto antes de dar un worker por muerto
    #[arg(long, env = "LEASE_SECS", default_value_t = DEFAULT_LEASE_SECS)]
    lease_secs: u64,

    #[arg(long, env = "SWEEP_INTERVAL_MS", default_value_t = 1_000)]
    sweep_interval_ms: u64,

    /// Espera tras terminar el job para que los workers reciban `exit`
    #[arg(long, env = "EXIT_GRACE_SECS", default_value_t = 2)]
    exit_grace_secs: u64,
}

/// Expande los patrones; un patrón sin match se toma como ruta literal.
/// Un archivo que matchea varios patrones queda una sola vez, en el orden
/// de su primera aparición.
fn expand_inputs(patterns: &[String]) -> Result<Vec<String>> {
    let mut inputs = Vec::new();

    for pattern in patterns {
        let mut matched = false;
        for entry in glob(pattern).with_context(|| format!("patrón inválido: {pattern}"))? {
            let path = entry.with_context(|| format!("leyendo match de {pattern}"))?;
            if path.is_file() {
                inputs.push(path.to_string_lossy().to_string());
                matched = true;
            }
        }
        if !matched {
            warn!("`{}` no matcheó ningún archivo, se usa tal cual", pattern);
            inputs.push(pattern.clone());
        }
    }

    Ok(inputs.into_iter().unique().collect())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("coordinator=debug,axum=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let inputs = expand_inputs(&args.inputs)?;
    if inputs.is_empty() {
        warn!("job sin entradas: solo se ejecutan los reduces");
    }

    let job_id = uuid::Uuid::new_v4().to_string();
    info!(
        "job {}: {} tareas map, {} tareas reduce",
        job_id,
        inputs.len(),
        args.reduce_tasks
    );

    let state = AppState::new(JobState::new(
        job_id,
        inputs,
        args.reduce_tasks,
        Duration::from_secs(args.lease_secs),
    ));

    // router HTTP
    let app = build_router(state.clone());

    let listener = TcpListener::bind(&args.addr)
        .await
        .with_context(|| format!("no se pudo escuchar en {}", args.addr))?;
    info!("coordinador escuchando en {}", listener.local_addr()?);

    // el servidor vive hasta que el job termina o llega ctrl-c
    let until_done = monitor::run_until_done(
        state,
        Duration::from_millis(args.sweep_interval_ms),
        Duration::from_secs(args.exit_grace_secs),
    );
    let shutdown = async move {
        tokio::select! {
            _ = until_done => {}
            _ = tokio::signal::ctrl_c() => warn!("ctrl-c: cerrando coordinador"),
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("servidor HTTP")?;

    info!("coordinador terminado");
    Ok(())
}
