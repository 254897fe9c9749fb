use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use common::{
    Assignment, FailureRequest, FailureResponse, JobProgress, MapDoneRequest, ReduceDoneRequest,
    ReportResponse, TaskKind, TaskRequest, WorkerRegisterRequest, WorkerRegisterResponse,
    WorkerStatus,
};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/job", get(get_job))
        .route("/api/v1/workers", get(list_workers))
        .route("/api/v1/workers/register", post(register_worker))
        .route("/api/v1/tasks/next", post(next_task))
        .route("/api/v1/tasks/map/complete", post(complete_map))
        .route("/api/v1/tasks/reduce/complete", post(complete_reduce))
        .route("/api/v1/tasks/fail", post(fail_task))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

async fn get_job(State(state): State<AppState>) -> Json<JobProgress> {
    Json(state.progress())
}

async fn list_workers(State(state): State<AppState>) -> Json<Vec<WorkerStatus>> {
    Json(state.workers())
}

async fn register_worker(
    State(state): State<AppState>,
    Json(req): Json<WorkerRegisterRequest>,
) -> Json<WorkerRegisterResponse> {
    let worker_id = state.register(req.hostname);
    Json(WorkerRegisterResponse { worker_id })
}

// Un worker pide trabajo: map, reduce, esperar o salir
async fn next_task(
    State(state): State<AppState>,
    Json(req): Json<TaskRequest>,
) -> Json<Assignment> {
    Json(state.request_task(req.worker_id))
}

async fn complete_map(
    State(state): State<AppState>,
    Json(req): Json<MapDoneRequest>,
) -> Json<ReportResponse> {
    let outcome = state.report_done(req.worker_id, TaskKind::Map, req.map_index, req.generation);
    info!(
        "worker {} reportó map {} -> {:?}",
        req.worker_id, req.map_index, outcome
    );
    Json(ReportResponse { outcome })
}

async fn complete_reduce(
    State(state): State<AppState>,
    Json(req): Json<ReduceDoneRequest>,
) -> Json<ReportResponse> {
    let outcome = state.report_done(
        req.worker_id,
        TaskKind::Reduce,
        req.reduce_index,
        req.generation,
    );
    info!(
        "worker {} reportó reduce {} -> {:?}",
        req.worker_id, req.reduce_index, outcome
    );
    Json(ReportResponse { outcome })
}

async fn fail_task(
    State(state): State<AppState>,
    Json(req): Json<FailureRequest>,
) -> Json<FailureResponse> {
    state.report_failure(req.worker_id);
    Json(FailureResponse { ok: true })
}
