//! Cliente HTTP del worker hacia el coordinador.
//!
//! Cada llamada tiene timeout. `register` y los reportes se reintentan con
//! backoff exponencial; el pedido de tarea no, porque el loop de polling ya
//! lo repite.

use std::time::Duration;

use common::{
    Assignment, FailureRequest, FailureResponse, Generation, MapDoneRequest, ReduceDoneRequest,
    ReportOutcome, ReportResponse, TaskRequest, WorkerId, WorkerRegisterRequest,
    WorkerRegisterResponse,
};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("error de transporte: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("el coordinador respondió {0}")]
    Status(StatusCode),
}

impl RpcError {
    /// Los 4xx no mejoran reintentando.
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::Transport(_) => true,
            RpcError::Status(status) => status.is_server_error(),
        }
    }
}

/// `base * 2^attempt`, con el exponente acotado en 10.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.min(10))
}

#[derive(Clone)]
pub struct CoordinatorClient {
    http: Client,
    base_url: String,
    retries: u32,
    backoff: Duration,
}

impl CoordinatorClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        retries: u32,
        backoff: Duration,
    ) -> Result<Self, RpcError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retries,
            backoff,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, RpcError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.http.post(&url).json(body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RpcError::Status(status));
        }
        Ok(resp.json().await?)
    }

    async fn post_with_retry<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, RpcError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let mut attempt = 0;
        loop {
            match self.post(path, body).await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    let delay = backoff_delay(self.backoff, attempt);
                    warn!(
                        "{} falló (intento {}/{}): {}; reintento en {:?}",
                        path,
                        attempt + 1,
                        self.retries + 1,
                        e,
                        delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn register(&self, hostname: &str) -> Result<WorkerId, RpcError> {
        let resp: WorkerRegisterResponse = self
            .post_with_retry(
                "/api/v1/workers/register",
                &WorkerRegisterRequest {
                    hostname: hostname.to_string(),
                },
            )
            .await?;
        Ok(resp.worker_id)
    }

    pub async fn request_task(&self, worker_id: WorkerId) -> Result<Assignment, RpcError> {
        let assignment: Assignment = self
            .post("/api/v1/tasks/next", &TaskRequest { worker_id })
            .await?;
        debug!("worker {} recibió {:?}", worker_id, assignment);
        Ok(assignment)
    }

    pub async fn report_map_done(
        &self,
        worker_id: WorkerId,
        map_index: u32,
        generation: Generation,
    ) -> Result<ReportOutcome, RpcError> {
        let resp: ReportResponse = self
            .post_with_retry(
                "/api/v1/tasks/map/complete",
                &MapDoneRequest {
                    worker_id,
                    map_index,
                    generation,
                },
            )
            .await?;
        Ok(resp.outcome)
    }

    pub async fn report_reduce_done(
        &self,
        worker_id: WorkerId,
        reduce_index: u32,
        generation: Generation,
    ) -> Result<ReportOutcome, RpcError> {
        let resp: ReportResponse = self
            .post_with_retry(
                "/api/v1/tasks/reduce/complete",
                &ReduceDoneRequest {
                    worker_id,
                    reduce_index,
                    generation,
                },
            )
            .await?;
        Ok(resp.outcome)
    }

    pub async fn report_failure(&self, worker_id: WorkerId) -> Result<(), RpcError> {
        let _: FailureResponse = self
            .post_with_retry("/api/v1/tasks/fail", &FailureRequest { worker_id })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode as HttpStatus, routing::post, Json, Router};
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };
    use tokio::net::TcpListener;

    /// Coordinador falso que responde 503 las primeras `fail_first` veces.
    async fn flaky_coordinator(fail_first: u32) -> (String, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let app = Router::new().route(
            "/api/v1/tasks/map/complete",
            post(move |Json(req): Json<MapDoneRequest>| {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < fail_first {
                        return Err(HttpStatus::SERVICE_UNAVAILABLE);
                    }
                    assert_eq!(req.generation, 3);
                    Ok(Json(ReportResponse {
                        outcome: ReportOutcome::Accepted,
                    }))
                }
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}"), calls)
    }

    #[test]
    fn backoff_duplica_y_se_acota() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(800));
        assert_eq!(backoff_delay(base, 10), backoff_delay(base, 50));
        assert_eq!(backoff_delay(Duration::MAX, 5), Duration::MAX);
    }

    #[test]
    fn solo_se_reintentan_errores_del_servidor() {
        assert!(RpcError::Status(StatusCode::SERVICE_UNAVAILABLE).is_retryable());
        assert!(!RpcError::Status(StatusCode::UNPROCESSABLE_ENTITY).is_retryable());
    }

    #[test]
    fn new_recorta_la_barra_final() {
        let c = CoordinatorClient::new(
            "http://localhost:8080/",
            Duration::from_secs(1),
            0,
            Duration::ZERO,
        )
        .unwrap();
        assert_eq!(c.base_url(), "http://localhost:8080");
    }

    #[tokio::test]
    async fn coordinador_inalcanzable_es_error_de_transporte() {
        // puerto reservado y sin nadie escuchando
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let c = CoordinatorClient::new(
            format!("http://{addr}"),
            Duration::from_millis(500),
            2,
            Duration::from_millis(1),
        )
        .unwrap();
        let err = c.register("h").await.unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
    }

    #[tokio::test]
    async fn reporte_con_503_se_reintenta_hasta_que_entra() {
        let (url, calls) = flaky_coordinator(1).await;
        let c = CoordinatorClient::new(url, Duration::from_secs(2), 3, Duration::from_millis(5)).unwrap();

        let outcome = c.report_map_done(7, 0, 3).await.unwrap();

        assert_eq!(outcome, ReportOutcome::Accepted);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn reporte_agota_los_reintentos_y_devuelve_el_status() {
        let (url, calls) = flaky_coordinator(u32::MAX).await;
        let c = CoordinatorClient::new(url, Duration::from_secs(2), 2, Duration::from_millis(1)).unwrap();

        let err = c.report_map_done(7, 0, 3).await.unwrap_err();

        assert!(matches!(err, RpcError::Status(s) if s == StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
