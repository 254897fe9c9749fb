use serde::{Deserialize, Serialize};

use crate::task::TaskKind;

/// Id monótono que asigna el coordinador al registrar; nunca se reutiliza.
pub type WorkerId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerState {
    Idle,
    Working,
    Dead,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRegisterRequest {
    pub hostname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRegisterResponse {
    pub worker_id: WorkerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRequest {
    pub worker_id: WorkerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureResponse {
    pub ok: bool,
}

/// Foto de un worker para `GET /api/v1/workers`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WorkerStatus {
    pub worker_id: WorkerId,
    pub hostname: String,
    pub state: WorkerState,
    pub current_task: Option<(TaskKind, u32)>,
    pub last_contact_secs_ago: u64,
    pub tasks_assigned: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
}
