use anyhow::Result;
use common::{Task, TaskReport};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::state::RunContext;
use crate::submit;

/// Procesa todas las tareas en paralelo, a lo sumo `pool_size` a la vez.
/// Cada tarea corre en un hilo de bloqueo porque todo lo que hace es
/// esperar herramientas externas.
///
/// Devuelve los reportes en el mismo orden que las tareas; una tarea que
/// hace panic se registra y no aparece en el resultado.
pub async fn process_tasks(ctx: RunContext, tasks: Vec<Task>) -> Result<Vec<TaskReport>> {
    let concurrency = ctx.settings.pool_size.max(1);
    let sem = Arc::new(Semaphore::new(concurrency));

    info!(
        "procesando {} tareas con hasta {} en paralelo",
        tasks.len(),
        concurrency
    );

    let mut handles = Vec::with_capacity(tasks.len());
    for task in tasks {
        // esperar un "slot" libre antes de lanzar la siguiente
        let permit = sem.clone().acquire_owned().await?;
        let ctx = ctx.clone();
        let dataset = task.dataset.clone();

        let handle = tokio::task::spawn_blocking(move || {
            let report = submit::process_task(&ctx, &task);
            drop(permit);
            report
        });
        handles.push((dataset, handle));
    }

    let mut reports = Vec::with_capacity(handles.len());
    for (dataset, handle) in handles {
        match handle.await {
            Ok(report) => reports.push(report),
            Err(e) => warn!("panic o join error procesando {}: {:?}", dataset, e),
        }
    }

    let total_jobs: usize = reports.iter().map(|r| r.job_ids().len()).sum();
    info!("número total de jobs enviados: {}", total_jobs);

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RunOptions;
    use crate::submit::tests::{temp_dir, test_context};
    use common::{JobSet, Split};

    #[tokio::test]
    async fn junta_los_ids_de_todas_las_tareas_en_orden() {
        let dir = temp_dir("pool");
        let (ctx, queue) = test_context(&dir, 6, RunOptions::default());

        let tasks = vec![
            Task {
                dataset: "/A/uno/USER".to_string(),
                arguments: String::new(),
                split: Split::Jobs(2),
            },
            Task {
                dataset: "/Vacio/dos/USER".to_string(),
                arguments: String::new(),
                split: Split::Jobs(2),
            },
            Task {
                dataset: "/C/tres/USER".to_string(),
                arguments: String::new(),
                split: Split::Jobs(3),
            },
        ];

        let reports = process_tasks(ctx, tasks).await.unwrap();

        let names: Vec<&str> = reports.iter().map(|r| r.task.as_str()).collect();
        assert_eq!(names, vec!["A_uno", "Vacio_dos", "C_tres"]);
        assert!(reports[1].error.is_some());

        let jobs = JobSet::from_reports(&reports);
        assert_eq!(jobs.total(), 5);
        assert_eq!(queue.submitted.lock().unwrap().len(), 5);
    }
}
