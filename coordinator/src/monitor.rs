use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info};

use crate::state::AppState;

/// Loop de vida del coordinador:
/// - cada `sweep_every` barre préstamos vencidos (vía `is_done`)
/// - cuando todas las tareas terminaron espera `exit_grace`, para que los
///   workers alcancen a recibir `exit`, y retorna
pub async fn run_until_done(state: AppState, sweep_every: Duration, exit_grace: Duration) {
    loop {
        sleep(sweep_every).await;

        if state.is_done() {
            break;
        }

        let p = state.progress();
        debug!(
            "maps {}/{} reduces {}/{}",
            p.map.completed, p.map.total, p.reduce.completed, p.reduce.total
        );
    }

    info!(
        "todas las tareas completas, cerrando en {:?}",
        exit_grace
    );
    sleep(exit_grace).await;
}
