use std::{env, path::PathBuf, str::FromStr, time::Duration};

use common::DEFAULT_POLL_INTERVAL_MS;

/// Configuración del worker, toda tomada del entorno.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub coordinator_url: String,
    pub app: String,
    pub store_dir: PathBuf,
    pub poll_interval: Duration,
    pub rpc_timeout: Duration,
    pub rpc_retries: u32,
    pub retry_backoff: Duration,
    pub max_poll_failures: u32,
}

/// URL base del coordinador.
/// - En Docker: COORDINATOR_URL=http://coordinator:8080
/// - Si no está definida, http://localhost:8080 (pruebas locales)
pub fn coordinator_base_url() -> String {
    env::var("COORDINATOR_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

fn parse_or<T: FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    parse_or(env::var(key).ok(), default)
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        Self {
            coordinator_url: coordinator_base_url(),
            app: env::var("WORKER_APP").unwrap_or_else(|_| "wc".to_string()),
            store_dir: PathBuf::from(env::var("STORE_DIR").unwrap_or_else(|_| ".".to_string())),
            poll_interval: Duration::from_millis(env_or("POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)),
            rpc_timeout: Duration::from_millis(env_or("RPC_TIMEOUT_MS", 5_000)),
            rpc_retries: env_or("RPC_RETRIES", 5),
            retry_backoff: Duration::from_millis(env_or("RETRY_BACKOFF_MS", 200)),
            max_poll_failures: env_or("MAX_POLL_FAILURES", 10),
        }
    }
}
