pub mod apps;
pub mod engine;
pub mod error;
pub mod job;
pub mod partition;
pub mod record;
pub mod store;
pub mod task;
pub mod worker;

pub use error::TaskError;
pub use job::{JobProgress, PhaseProgress};
pub use record::KeyValue;
pub use task::{
    Assignment, Generation, MapDoneRequest, ReduceDoneRequest, ReportOutcome, ReportResponse,
    TaskKind, TaskRequest,
};
pub use worker::{
    FailureRequest, FailureResponse, WorkerId, WorkerRegisterRequest, WorkerRegisterResponse,
    WorkerState, WorkerStatus,
};

/// Intervalo entre pedidos de tarea sin éxito de un worker.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Tiempo sin contacto tras el cual un worker se da por muerto.
pub const DEFAULT_LEASE_SECS: u64 = 10;
