use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use common::{JobProgress, PhaseProgress, WorkerStatus};
use reqwest::Client;
use std::env;

/// Igual que en el worker:
/// - En Docker: COORDINATOR_URL=http://coordinator:8080
/// - Local: default http://localhost:8080
fn coordinator_base_url() -> String {
    env::var("COORDINATOR_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "CLI simple para consultar al coordinador")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Progreso del job
    Status,
    /// Lista los workers registrados
    Workers,
    /// Chequea que el coordinador responda
    Health,
}

fn phase_line(name: &str, p: &PhaseProgress) -> String {
    format!(
        "  {:<7}: {}/{} completas ({} en curso, {} pendientes)",
        name, p.completed, p.total, p.assigned, p.unassigned
    )
}

async fn get_json<T: serde::de::DeserializeOwned>(client: &Client, url: &str) -> Result<T> {
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("sin respuesta de {url}"))?;
    if !resp.status().is_success() {
        bail!("{url} respondió {}", resp.status());
    }
    Ok(resp.json().await?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base_url = coordinator_base_url();

    match cli.command {
        Commands::Status => {
            let job: JobProgress = get_json(&client, &format!("{}/api/v1/job", base_url)).await?;

            println!("Job {}", job.job_id);
            println!("  estado : {}", if job.done { "terminado" } else { "en curso" });
            println!("{}", phase_line("map", &job.map));
            println!("{}", phase_line("reduce", &job.reduce));
            println!("  inicio : {}", job.started_at.to_rfc3339());
            if let Some(fin) = job.finished_at {
                println!("  fin    : {}", fin.to_rfc3339());
            }
        }
        Commands::Workers => {
            let workers: Vec<WorkerStatus> =
                get_json(&client, &format!("{}/api/v1/workers", base_url)).await?;
            if workers.is_empty() {
                println!("No hay workers registrados.");
            }
            for w in workers {
                println!("Worker {}", w.worker_id);
                println!("  host         : {}", w.hostname);
                println!("  estado       : {:?}", w.state);
                match w.current_task {
                    Some((kind, index)) => println!("  tarea        : {:?} {}", kind, index),
                    None => println!("  tarea        : (ninguna)"),
                }
                println!("  last_contact : {} s ago", w.last_contact_secs_ago);
                println!(
                    "  tareas       : asignadas={}, ok={}, failed={}",
                    w.tasks_assigned, w.tasks_completed, w.tasks_failed
                );
                println!();
            }
        }
        Commands::Health => {
            let url = format!("{}/health", base_url);
            let resp = client
                .get(&url)
                .send()
                .await
                .with_context(|| format!("sin respuesta de {url}"))?;
            if !resp.status().is_success() {
                bail!("coordinador no sano: {}", resp.status());
            }
            println!("{}", resp.text().await?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_line_muestra_los_conteos() {
        let p = PhaseProgress {
            total: 4,
            unassigned: 1,
            assigned: 1,
            completed: 2,
        };
        assert_eq!(
            phase_line("map", &p),
            "  map    : 2/4 completas (1 en curso, 1 pendientes)"
        );
    }

    #[test]
    fn cli_acepta_los_subcomandos() {
        assert!(Cli::try_parse_from(["client", "status"]).is_ok());
        assert!(Cli::try_parse_from(["client", "workers"]).is_ok());
        assert!(Cli::try_parse_from(["client", "health"]).is_ok());
        assert!(Cli::try_parse_from(["client", "submit", "x"]).is_err());
    }
}
