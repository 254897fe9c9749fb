use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Conteo de tareas de una fase por estado.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseProgress {
    pub total: u32,
    pub unassigned: u32,
    pub assigned: u32,
    pub completed: u32,
}

impl PhaseProgress {
    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}

/// Estado del único job que maneja un coordinador.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgress {
    pub job_id: String,
    pub reduce_count: u32,
    pub map: PhaseProgress,
    pub reduce: PhaseProgress,
    pub done: bool,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}
