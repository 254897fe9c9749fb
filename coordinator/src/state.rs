// coordinator/src/state.rs

use chrono::{DateTime, Utc};
use common::{
    Assignment, Generation, JobProgress, PhaseProgress, ReportOutcome, TaskKind, WorkerId,
    WorkerState, WorkerStatus,
};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Unassigned,
    Assigned,
    Completed,
}

#[derive(Debug, Clone)]
struct TaskSlot {
    state: TaskState,
    owner: Option<WorkerId>,
    // 0 = nunca asignada
    generation: Generation,
}

impl TaskSlot {
    fn new() -> Self {
        Self {
            state: TaskState::Unassigned,
            owner: None,
            generation: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct WorkerSlot {
    hostname: String,
    state: WorkerState,
    last_contact: Instant,
    current: Option<(TaskKind, u32)>,

    // Métricas
    tasks_assigned: u64,
    tasks_completed: u64,
    tasks_failed: u64,
}

/// Máquina de estados del job: tareas, workers y sus préstamos.
///
/// Todas las operaciones reciben el instante actual, así el estado no
/// depende del reloj y se puede probar con tiempos sintéticos. El acceso
/// concurrente lo serializa [`AppState`].
#[derive(Debug)]
pub struct JobState {
    job_id: String,
    inputs: Vec<String>,
    reduce_count: u32,
    lease: Duration,

    map_tasks: Vec<TaskSlot>,
    reduce_tasks: Vec<TaskSlot>,

    workers: BTreeMap<WorkerId, WorkerSlot>,
    next_worker_id: WorkerId,

    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl JobState {
    pub fn new(job_id: impl Into<String>, inputs: Vec<String>, reduce_count: u32, lease: Duration) -> Self {
        let map_tasks = inputs.iter().map(|_| TaskSlot::new()).collect();
        let reduce_tasks = (0..reduce_count).map(|_| TaskSlot::new()).collect();

        Self {
            job_id: job_id.into(),
            inputs,
            reduce_count,
            lease,
            map_tasks,
            reduce_tasks,
            workers: BTreeMap::new(),
            next_worker_id: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn tasks(&self, kind: TaskKind) -> &[TaskSlot] {
        match kind {
            TaskKind::Map => &self.map_tasks,
            TaskKind::Reduce => &self.reduce_tasks,
        }
    }

    fn tasks_mut(&mut self, kind: TaskKind) -> &mut Vec<TaskSlot> {
        match kind {
            TaskKind::Map => &mut self.map_tasks,
            TaskKind::Reduce => &mut self.reduce_tasks,
        }
    }

    fn phase_complete(&self, kind: TaskKind) -> bool {
        self.tasks(kind)
            .iter()
            .all(|t| t.state == TaskState::Completed)
    }

    /// Marca contacto del worker. Un worker muerto que vuelve a hablar revive.
    fn touch(&mut self, worker_id: WorkerId, now: Instant) -> Option<&mut WorkerSlot> {
        let worker = self.workers.get_mut(&worker_id)?;
        worker.last_contact = now;
        if worker.state == WorkerState::Dead {
            info!("worker {} dado por muerto volvió a contactar", worker_id);
            worker.state = WorkerState::Idle;
        }
        Some(worker)
    }

    /// Devuelve a `Unassigned` la tarea que tenga el worker, si tiene alguna.
    fn reallocate(&mut self, worker_id: WorkerId) -> Option<(TaskKind, u32)> {
        let (kind, index) = self.workers.get_mut(&worker_id)?.current.take()?;

        if let Some(slot) = self.tasks_mut(kind).get_mut(index as usize) {
            if slot.state == TaskState::Assigned && slot.owner == Some(worker_id) {
                slot.state = TaskState::Unassigned;
                slot.owner = None;
                info!(
                    "tarea {:?} {} liberada del worker {} (generación {})",
                    kind, index, worker_id, slot.generation
                );
                return Some((kind, index));
            }
        }
        None
    }

    fn assign(&mut self, kind: TaskKind, index: usize, worker_id: WorkerId) -> Generation {
        let slot = &mut self.tasks_mut(kind)[index];
        slot.state = TaskState::Assigned;
        slot.owner = Some(worker_id);
        slot.generation += 1;
        let generation = slot.generation;

        if let Some(worker) = self.workers.get_mut(&worker_id) {
            worker.current = Some((kind, index as u32));
            worker.state = WorkerState::Working;
            worker.tasks_assigned += 1;
        }

        info!(
            "asignando tarea {:?} {} al worker {} (generación {})",
            kind, index, worker_id, generation
        );
        generation
    }

    fn first_unassigned(&self, kind: TaskKind) -> Option<usize> {
        self.tasks(kind)
            .iter()
            .position(|t| t.state == TaskState::Unassigned)
    }

    /* ---------------- operaciones ---------------- */

    pub fn register(&mut self, hostname: impl Into<String>, now: Instant) -> WorkerId {
        let worker_id = self.next_worker_id;
        self.next_worker_id += 1;

        let hostname = hostname.into();
        info!("worker registrado: {} ({})", worker_id, hostname);

        self.workers.insert(
            worker_id,
            WorkerSlot {
                hostname,
                state: WorkerState::Idle,
                last_contact: now,
                current: None,
                tasks_assigned: 0,
                tasks_completed: 0,
                tasks_failed: 0,
            },
        );
        worker_id
    }

    /// Elige la próxima tarea para el worker.
    ///
    /// Maps primero, en orden de índice. Ningún reduce sale de `Unassigned`
    /// mientras quede un map sin completar. Con todo completado responde
    /// `Exit`.
    pub fn request_task(&mut self, worker_id: WorkerId, now: Instant) -> Assignment {
        let Some(worker) = self.touch(worker_id, now) else {
            warn!("pedido de tarea de worker desconocido {}", worker_id);
            return Assignment::None;
        };

        if let Some((kind, index)) = worker.current {
            warn!(
                "worker {} pide tarea sin reportar {:?} {}; se libera",
                worker_id, kind, index
            );
            self.reallocate(worker_id);
        }

        if let Some(i) = self.first_unassigned(TaskKind::Map) {
            let generation = self.assign(TaskKind::Map, i, worker_id);
            return Assignment::Map {
                map_index: i as u32,
                input_id: self.inputs[i].clone(),
                reduce_count: self.reduce_count,
                generation,
            };
        }

        // barrera de fase: sin todos los maps completos no sale ningún reduce
        if self.phase_complete(TaskKind::Map) {
            if let Some(i) = self.first_unassigned(TaskKind::Reduce) {
                let generation = self.assign(TaskKind::Reduce, i, worker_id);
                return Assignment::Reduce {
                    reduce_index: i as u32,
                    map_count: self.map_tasks.len() as u32,
                    generation,
                };
            }
        }

        let assignment = if self.phase_complete(TaskKind::Map) && self.phase_complete(TaskKind::Reduce) {
            Assignment::Exit
        } else {
            Assignment::None
        };

        if let Some(worker) = self.workers.get_mut(&worker_id) {
            worker.state = WorkerState::Idle;
        }
        debug!("worker {} pidió tarea: {:?}", worker_id, assignment);
        assignment
    }

    /// Reporte de tarea terminada.
    ///
    /// Solo se acepta si `generation` es la generación vigente de la tarea:
    /// un worker dado por muerto cuya tarea ya se reasignó no puede
    /// completarla con un reporte tardío.
    pub fn report_done(
        &mut self,
        worker_id: WorkerId,
        kind: TaskKind,
        index: u32,
        generation: Generation,
        now: Instant,
    ) -> ReportOutcome {
        if self.touch(worker_id, now).is_none() {
            warn!("reporte de worker desconocido {}", worker_id);
        }

        let Some(slot) = self.tasks_mut(kind).get_mut(index as usize) else {
            warn!("reporte de tarea inexistente {:?} {}", kind, index);
            return ReportOutcome::Stale;
        };

        let outcome = if slot.state == TaskState::Completed {
            ReportOutcome::Duplicate
        } else if generation != 0 && slot.generation == generation {
            slot.state = TaskState::Completed;
            slot.owner = None;
            ReportOutcome::Accepted
        } else {
            warn!(
                "descartando reporte viejo de {:?} {} del worker {} (generación {}, vigente {})",
                kind, index, worker_id, generation, slot.generation
            );
            ReportOutcome::Stale
        };
        let still_owned = slot.owner == Some(worker_id);

        if let Some(worker) = self.workers.get_mut(&worker_id) {
            if worker.current == Some((kind, index)) && !still_owned {
                worker.current = None;
            }
            if worker.current.is_none() {
                worker.state = WorkerState::Idle;
            }
            if outcome == ReportOutcome::Accepted {
                worker.tasks_completed += 1;
            }
        }

        if outcome == ReportOutcome::Accepted {
            info!("{}", self.progress_line());
        }
        outcome
    }

    pub fn report_failure(&mut self, worker_id: WorkerId, now: Instant) {
        let Some(worker) = self.touch(worker_id, now) else {
            warn!("reporte de fallo de worker desconocido {}", worker_id);
            return;
        };
        worker.state = WorkerState::Idle;

        if let Some((kind, index)) = self.reallocate(worker_id) {
            warn!("worker {} falló la tarea {:?} {}", worker_id, kind, index);
            if let Some(worker) = self.workers.get_mut(&worker_id) {
                worker.tasks_failed += 1;
            }
        }
    }

    /// Declara muertos a los workers cuyo préstamo venció y libera sus
    /// tareas. Devuelve los ids recién declarados muertos.
    pub fn sweep(&mut self, now: Instant) -> Vec<WorkerId> {
        let expired: Vec<WorkerId> = self
            .workers
            .iter()
            .filter(|(_, w)| {
                w.state != WorkerState::Dead
                    && now.saturating_duration_since(w.last_contact) >= self.lease
            })
            .map(|(id, _)| *id)
            .collect();

        for worker_id in &expired {
            if let Some(worker) = self.workers.get_mut(worker_id) {
                warn!(
                    "marcando worker {} como DEAD (sin contacto hace {:?})",
                    worker_id,
                    now.saturating_duration_since(worker.last_contact)
                );
                worker.state = WorkerState::Dead;
            }
            if self.reallocate(*worker_id).is_some() {
                if let Some(worker) = self.workers.get_mut(worker_id) {
                    worker.tasks_failed += 1;
                }
            }
        }
        expired
    }

    /// Barrido de vida + ¿están completadas todas las tareas?
    pub fn is_done(&mut self, now: Instant) -> bool {
        self.sweep(now);

        let done = self.phase_complete(TaskKind::Map) && self.phase_complete(TaskKind::Reduce);
        if done && self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
            info!("job {} terminado", self.job_id);
        }
        done
    }

    /* ---------------- consultas ---------------- */

    fn phase_progress(&self, kind: TaskKind) -> PhaseProgress {
        let mut p = PhaseProgress {
            total: self.tasks(kind).len() as u32,
            ..PhaseProgress::default()
        };
        for t in self.tasks(kind) {
            match t.state {
                TaskState::Unassigned => p.unassigned += 1,
                TaskState::Assigned => p.assigned += 1,
                TaskState::Completed => p.completed += 1,
            }
        }
        p
    }

    fn progress_line(&self) -> String {
        let map = self.phase_progress(TaskKind::Map);
        let reduce = self.phase_progress(TaskKind::Reduce);
        format!(
            "{}/{} maps completos, {}/{} reduces completos",
            map.completed, map.total, reduce.completed, reduce.total
        )
    }

    pub fn progress(&self) -> JobProgress {
        let map = self.phase_progress(TaskKind::Map);
        let reduce = self.phase_progress(TaskKind::Reduce);
        JobProgress {
            job_id: self.job_id.clone(),
            reduce_count: self.reduce_count,
            done: map.is_complete() && reduce.is_complete(),
            map,
            reduce,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }

    pub fn workers(&self, now: Instant) -> Vec<WorkerStatus> {
        self.workers
            .iter()
            .map(|(id, w)| WorkerStatus {
                worker_id: *id,
                hostname: w.hostname.clone(),
                state: w.state,
                current_task: w.current,
                last_contact_secs_ago: now.saturating_duration_since(w.last_contact).as_secs(),
                tasks_assigned: w.tasks_assigned,
                tasks_completed: w.tasks_completed,
                tasks_failed: w.tasks_failed,
            })
            .collect()
    }
}

/// Dueño compartido del estado del job. Cada operación toma el único lock,
/// así todas son atómicas entre sí; nunca se hace I/O con el lock tomado.
#[derive(Clone)]
pub struct AppState {
    job: Arc<Mutex<JobState>>,
}

impl AppState {
    pub fn new(job: JobState) -> Self {
        Self {
            job: Arc::new(Mutex::new(job)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.job.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn register(&self, hostname: impl Into<String>) -> WorkerId {
        self.lock().register(hostname, Instant::now())
    }

    pub fn request_task(&self, worker_id: WorkerId) -> Assignment {
        self.lock().request_task(worker_id, Instant::now())
    }

    pub fn report_done(
        &self,
        worker_id: WorkerId,
        kind: TaskKind,
        index: u32,
        generation: Generation,
    ) -> ReportOutcome {
        self.lock()
            .report_done(worker_id, kind, index, generation, Instant::now())
    }

    pub fn report_failure(&self, worker_id: WorkerId) {
        self.lock().report_failure(worker_id, Instant::now())
    }

    pub fn is_done(&self) -> bool {
        self.lock().is_done(Instant::now())
    }

    pub fn progress(&self) -> JobProgress {
        self.lock().progress()
    }

    pub fn workers(&self) -> Vec<WorkerStatus> {
        self.lock().workers(Instant::now())
    }
}
