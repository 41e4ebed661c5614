use common::{BatchQueue, JobSet};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

/// Cómo terminó el loop de polling.
#[derive(Debug)]
pub struct PollOutcome {
    pub jobs: JobSet,
    pub polls: u32,
    /// true si se cortó por el máximo de consultas con jobs pendientes
    pub hit_ceiling: bool,
}

/// Espera a que la cola deje de listar todos los jobs enviados.
///
/// Cada `interval` consulta los jobs activos del usuario; los pendientes que
/// ya no aparecen pasan a terminados. Corta cuando no queda ninguno pendiente
/// o tras `max_polls` consultas (eso no es error, solo se avisa).
pub async fn wait_for_jobs(
    queue: Arc<dyn BatchQueue>,
    mut jobs: JobSet,
    interval: Duration,
    max_polls: u32,
) -> PollOutcome {
    let total = jobs.total();
    let mut polls = 0;

    info!("número total de jobs a esperar: {}", total);

    while !jobs.is_done() && polls < max_polls {
        tokio::time::sleep(interval).await;
        polls += 1;

        let q = queue.clone();
        let listing = tokio::task::spawn_blocking(move || q.active_jobs()).await;

        match listing {
            Ok(Ok(active)) => {
                for id in jobs.update(&active) {
                    if let Some(job) = jobs.get(id) {
                        debug!(job_id = id, task = %job.task, job = job.index, "job terminado");
                    }
                }
                info!("jobs restantes: {} / {}", jobs.pending(), total);
            }
            Ok(Err(e)) => {
                // sin listado no sabemos nada: no se marca ningún job
                warn!("no se pudo consultar la cola (consulta {}): {}", polls, e);
            }
            Err(e) => {
                warn!("panic o join error consultando la cola: {:?}", e);
            }
        }
    }

    let hit_ceiling = !jobs.is_done();
    if hit_ceiling {
        warn!(
            "se alcanzó el máximo de {} consultas con {} jobs todavía pendientes, se sigue igual",
            max_polls,
            jobs.pending()
        );
    }

    PollOutcome {
        jobs,
        polls,
        hit_ceiling,
    }
}
