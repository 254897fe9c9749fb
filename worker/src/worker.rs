use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use common::{
    apps::{self, Workload},
    engine,
    store::{BlobStore, FsStore},
    Assignment, ReportOutcome, TaskError, WorkerId,
};
use tokio::{sync::watch, time::sleep};
use tracing::{debug, info, warn};

use crate::{config::WorkerConfig, rpc::CoordinatorClient};

/// Por qué terminó el loop del worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// El coordinador avisó que el job terminó.
    Exit,
    /// Demasiados pedidos seguidos sin respuesta.
    CoordinatorGone,
    /// Señal de corte local (ctrl-c).
    Interrupted,
}

/// Worker de un solo hilo lógico: pide una tarea, la ejecuta, la reporta.
pub struct Worker {
    client: CoordinatorClient,
    store: Arc<dyn BlobStore>,
    app: Workload,
    poll_interval: Duration,
    max_poll_failures: u32,
}

impl Worker {
    pub fn new(
        client: CoordinatorClient,
        store: Arc<dyn BlobStore>,
        app: Workload,
        poll_interval: Duration,
        max_poll_failures: u32,
    ) -> Self {
        Self {
            client,
            store,
            app,
            poll_interval,
            max_poll_failures: max_poll_failures.max(1),
        }
    }

    pub fn from_config(cfg: &WorkerConfig) -> Result<Self> {
        let client = CoordinatorClient::new(
            cfg.coordinator_url.clone(),
            cfg.rpc_timeout,
            cfg.rpc_retries,
            cfg.retry_backoff,
        )
        .context("creando cliente HTTP")?;
        let app = apps::named(&cfg.app)?;
        let store: Arc<dyn BlobStore> = Arc::new(FsStore::new(&cfg.store_dir));

        Ok(Self::new(
            client,
            store,
            app,
            cfg.poll_interval,
            cfg.max_poll_failures,
        ))
    }

    /// Espera el intervalo de polling o hasta que llegue la señal de corte.
    async fn pause(&self, stop: &mut watch::Receiver<bool>) {
        tokio::select! {
            _ = sleep(self.poll_interval) => {}
            Ok(()) = stop.changed() => {}
        }
    }

    /// Loop principal:
    /// - se registra (con reintentos)
    /// - pide tareas hasta recibir `exit`, perder al coordinador o recibir
    ///   la señal de corte
    pub async fn run(&self, hostname: &str, mut stop: watch::Receiver<bool>) -> Result<StopReason> {
        let worker_id = self
            .client
            .register(hostname)
            .await
            .with_context(|| format!("registrando worker en {}", self.client.base_url()))?;
        info!(
            "worker {} registrado contra {}",
            worker_id,
            self.client.base_url()
        );

        let mut failures = 0;
        let mut completed = 0u32;

        let reason = loop {
            if *stop.borrow() {
                break StopReason::Interrupted;
            }

            let assignment = match self.client.request_task(worker_id).await {
                Ok(a) => {
                    failures = 0;
                    a
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        "no se pudo pedir tarea ({}/{}): {}",
                        failures, self.max_poll_failures, e
                    );
                    if failures >= self.max_poll_failures {
                        break StopReason::CoordinatorGone;
                    }
                    self.pause(&mut stop).await;
                    continue;
                }
            };

            match assignment {
                Assignment::None => {
                    debug!("worker {} sin tarea, esperando", worker_id);
                    self.pause(&mut stop).await;
                }
                Assignment::Exit => break StopReason::Exit,
                task => {
                    if self.execute(worker_id, task).await {
                        completed += 1;
                    }
                }
            }
        };

        info!(
            "worker {} terminando ({:?}), {} tareas aceptadas",
            worker_id, reason, completed
        );
        Ok(reason)
    }

    /// Ejecuta la tarea en el pool bloqueante y la reporta. Devuelve `true`
    /// si el coordinador aceptó el resultado.
    async fn execute(&self, worker_id: WorkerId, task: Assignment) -> bool {
        let store = self.store.clone();
        let app = self.app;

        let (label, generation, job): (String, _, Box<dyn FnOnce() -> Result<(), TaskError> + Send>) =
            match task.clone() {
                Assignment::Map {
                    map_index,
                    input_id,
                    reduce_count,
                    generation,
                } => (
                    format!("map {map_index} ({input_id})"),
                    generation,
                    Box::new(move || {
                        engine::run_map(store.as_ref(), &app, map_index, &input_id, reduce_count)
                    }),
                ),
                Assignment::Reduce {
                    reduce_index,
                    map_count,
                    generation,
                } => (
                    format!("reduce {reduce_index}"),
                    generation,
                    Box::new(move || engine::run_reduce(store.as_ref(), &app, reduce_index, map_count)),
                ),
                Assignment::None | Assignment::Exit => return false,
            };

        info!(
            "worker {} ejecutando {} (generación {})",
            worker_id, label, generation
        );

        let ok = match tokio::task::spawn_blocking(job).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("error procesando {}: {}", label, e);
                false
            }
            Err(e) => {
                warn!("panic o join error en {}: {:?}", label, e);
                false
            }
        };

        if !ok {
            if let Err(e) = self.client.report_failure(worker_id).await {
                warn!("no se pudo reportar el fallo de {}: {}", label, e);
            }
            return false;
        }

        let outcome = match task {
            Assignment::Map { map_index, .. } => {
                self.client
                    .report_map_done(worker_id, map_index, generation)
                    .await
            }
            Assignment::Reduce { reduce_index, .. } => {
                self.client
                    .report_reduce_done(worker_id, reduce_index, generation)
                    .await
            }
            Assignment::None | Assignment::Exit => return false,
        };

        match outcome {
            Ok(ReportOutcome::Accepted) => {
                info!("terminé {} correctamente", label);
                true
            }
            Ok(other) => {
                info!("{} ya no es nuestra ({:?})", label, other);
                false
            }
            // el préstamo vence y el coordinador la reasigna
            Err(e) => {
                warn!("no se pudo reportar {}: {}", label, e);
                false
            }
        }
    }
}
