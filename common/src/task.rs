use serde::{Deserialize, Serialize};

use crate::worker::WorkerId;

/// Número de asignación de una tarea. Sube en cada asignación, así cada
/// préstamo de la tarea tiene su propio valor.
pub type Generation = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Map,
    Reduce,
}

/// Respuesta a un pedido de tarea.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task_type", rename_all = "snake_case")]
pub enum Assignment {
    /// No hay nada para hacer ahora; volver a pedir más tarde.
    None,
    Map {
        map_index: u32,
        input_id: String,
        reduce_count: u32,
        generation: Generation,
    },
    Reduce {
        reduce_index: u32,
        map_count: u32,
        generation: Generation,
    },
    /// El job terminó; el worker puede salir.
    Exit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub worker_id: WorkerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapDoneRequest {
    pub worker_id: WorkerId,
    pub map_index: u32,
    pub generation: Generation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReduceDoneRequest {
    pub worker_id: WorkerId,
    pub reduce_index: u32,
    pub generation: Generation,
}

/// Qué hizo el coordinador con un reporte de tarea terminada.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportOutcome {
    /// La tarea quedó completada con este reporte.
    Accepted,
    /// La tarea ya estaba completada; no cambia nada.
    Duplicate,
    /// El reporte es de una asignación vieja y se descartó.
    Stale,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportResponse {
    pub outcome: ReportOutcome,
}
