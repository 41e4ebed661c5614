use chrono::Utc;
use common::{
    template::instance_file_name, ConfigTemplate, FileListResolver, Job, Placeholder, RunConfig,
    RunError, SplitPlan, SubmitRequest, Substitutions, Task, TaskReport,
};
use std::{fs, path::Path};
use tracing::{debug, info, warn};

use crate::state::RunContext;

/* ---------------- procesamiento de una tarea ---------------- */

/// Procesa una tarea completa: lista de archivos, partición, scripts y envío.
/// Bloqueante; el pool lo corre en `spawn_blocking`.
///
/// Los errores de la tarea no se propagan: quedan en el reporte (sin jobs)
/// y las demás tareas siguen.
pub fn process_task(ctx: &RunContext, task: &Task) -> TaskReport {
    let folder = task.folder_name();
    let task_dir = ctx.config.work_path.join(&folder);

    info!("procesando {}", task.dataset);

    match prepare_and_submit(ctx, task, &folder, &task_dir) {
        Ok(report) => {
            if let Err(e) = report.write_manifest() {
                warn!(task = %folder, "no se pudo escribir el manifiesto: {}", e);
            }
            report
        }
        Err(e) => {
            warn!(task = %folder, "la tarea no generó jobs: {}", e);
            TaskReport::failed(folder, task.dataset.clone(), task_dir, e.to_string())
        }
    }
}

fn prepare_and_submit(
    ctx: &RunContext,
    task: &Task,
    folder: &str,
    task_dir: &Path,
) -> Result<TaskReport, RunError> {
    // 1) Lista de archivos (caché o catálogo)
    let resolver = FileListResolver::new(
        ctx.catalog.as_ref(),
        ctx.settings.cache_dir.clone(),
        ctx.options.renew,
    );
    let list = resolver.resolve(&task.dataset)?;
    debug!(task = %folder, "{} archivos ({:?})", list.len(), list.source);
    let inputs = list.input_paths(&ctx.settings.dcap_prefix);

    // 2) Partición en jobs
    let plan = SplitPlan::compute(inputs.len(), task.split)?;
    info!(
        task = %folder,
        "se van a crear {} jobs con {} archivos cada uno ({} archivos en total)",
        plan.number_of_jobs,
        plan.files_per_job,
        inputs.len()
    );

    // 3) Template y directorio de trabajo
    let template = ConfigTemplate::load(&ctx.config.conf_template)?;
    let present = template.placeholders();
    for p in Placeholder::ALL {
        if !present.contains(&p) {
            warn!(task = %folder, "el template no usa el marcador {}", p.token());
        }
    }
    fs::create_dir_all(task_dir).map_err(|e| RunError::io(task_dir, e))?;

    // 4) Un script (y un envío) por chunk
    let mut jobs = Vec::with_capacity(plan.number_of_jobs as usize);
    for (index, chunk) in plan.chunks(&inputs).into_iter().enumerate() {
        let index = index as u32;
        if chunk.is_empty() {
            warn!(task = %folder, "{}", RunError::EmptyChunk { index });
            continue;
        }

        let mut job = match write_job_config(ctx, task, folder, task_dir, &template, index, chunk)
        {
            Ok(job) => job,
            Err(e) => {
                warn!(task = %folder, job = index, "no se pudo preparar el job: {}", e);
                continue;
            }
        };

        submit_job(ctx, folder, &mut job);
        jobs.push(job);
    }

    Ok(TaskReport {
        task: folder.to_string(),
        dataset: task.dataset.clone(),
        task_dir: task_dir.to_path_buf(),
        plan: Some(plan),
        jobs,
        error: None,
    })
}

/// Valores para los marcadores del template de un job.
pub fn substitutions(
    config: &RunConfig,
    folder: &str,
    index: u32,
    files: &[String],
    arguments: &str,
) -> Substitutions {
    let mut source = String::from("\"");
    for f in files {
        source.push_str(f);
        source.push(' ');
    }
    source.push('"');

    let mut values = Substitutions::new();
    values.insert(Placeholder::SourceFiles, source);
    values.insert(
        Placeholder::JobDir,
        format!("{}/{}_{}", folder, config.srm_path, index),
    );
    values.insert(Placeholder::Executable, config.executable.clone());
    values.insert(
        Placeholder::SrmDir,
        format!("{}/{}", config.srm_path, folder),
    );
    values.insert(Placeholder::HpName, config.hp_name.clone());
    values.insert(Placeholder::Arguments, format!("\"{}\"", arguments));
    values.insert(Placeholder::Release, config.release_path.clone());
    values
}

fn write_job_config(
    ctx: &RunContext,
    task: &Task,
    folder: &str,
    task_dir: &Path,
    template: &ConfigTemplate,
    index: u32,
    files: &[String],
) -> Result<Job, RunError> {
    let values = substitutions(&ctx.config, folder, index, files, &task.arguments);
    let text = template.render(&values)?;

    let config_path = task_dir.join(instance_file_name(&ctx.config.conf_template, index));
    fs::write(&config_path, text).map_err(|e| RunError::io(&config_path, e))?;
    debug!(task = %folder, job = index, "script escrito en {}", config_path.display());

    Ok(Job {
        index,
        name: format!("RMG{}{}", index, folder),
        files: files.to_vec(),
        config_path,
        stdout_path: task_dir.join(format!("job_{}.out", index)),
        stderr_path: task_dir.join(format!("job_{}.err", index)),
        job_id: None,
        submitted_at: None,
    })
}

/// Manda el job a la cola. En dry-run solo muestra el comando.
/// Un envío fallido se registra y el job queda sin id.
fn submit_job(ctx: &RunContext, folder: &str, job: &mut Job) {
    let req = SubmitRequest {
        name: job.name.clone(),
        script: job.config_path.clone(),
        stdout: job.stdout_path.clone(),
        stderr: job.stderr_path.clone(),
        args: vec![job.index.to_string()],
    };

    if ctx.options.verbose {
        info!("{}", ctx.queue.describe(&req));
    } else {
        debug!("{}", ctx.queue.describe(&req));
    }

    if ctx.options.dry_run {
        return;
    }

    match ctx.queue.submit(&req) {
        Ok(id) => {
            job.job_id = Some(id);
            job.submitted_at = Some(Utc::now());
            info!(task = %folder, job = job.index, job_id = id, "job enviado");
        }
        Err(e) => {
            warn!(task = %folder, job = job.index, "falló el envío: {}", e);
        }
    }
}
