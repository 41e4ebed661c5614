mod cli;
mod merge;
mod monitor;
mod pool;
mod state;
mod submit;

use anyhow::{Context, Result};
use clap::Parser;
use common::{proxy, task, JobSet, RunConfig, SiteSettings, VomsProxy};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::state::RunContext;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG manda; si no está, -v sube a debug
    let default_filter = if cli.verbose {
        "runmanager=debug,common=debug"
    } else {
        "runmanager=info,common=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let options = cli.options();

    /* ---- configuración ---- */
    let config = RunConfig::from_file(&cli.config)
        .with_context(|| format!("leyendo la configuración {}", cli.config.display()))?;

    info!("parámetros de la corrida:");
    info!("  ReleasePath:  {}", config.release_path);
    info!("  Executable:   {}", config.executable);
    info!("  NameOfConf:   {}", config.conf_template.display());
    info!("  NameOfSource: {}", config.task_list.display());
    info!("  SrmPath:      {}", config.srm_path);
    info!("  WorkPath:     {}", config.work_path.display());
    info!("  HPName:       {}", config.hp_name);

    config.check_paths()?;

    let settings = SiteSettings::from_env();
    info!(
        "cola {}, pool de {}, polling cada {:?} (máx {})",
        settings.queue, settings.pool_size, settings.poll_interval, settings.max_polls
    );

    /* ---- credenciales ---- */
    let status = tokio::task::spawn_blocking(|| proxy::ensure_proxy(&VomsProxy)).await??;
    info!("proxy: {:?}", status);

    /* ---- tareas ---- */
    let tasks = task::read_task_list(&config.task_list)?;
    if tasks.is_empty() {
        warn!("la lista de tareas no tiene ninguna línea válida");
    }

    let ctx = RunContext::for_site(config, settings, options);

    /* ---- envío ---- */
    if !options.merge_only {
        let reports = pool::process_tasks(ctx.clone(), tasks.clone()).await?;

        for report in &reports {
            if let Some(err) = &report.error {
                warn!("tarea {} sin jobs: {}", report.task, err);
            }
        }

        if options.dry_run {
            info!("dry run: scripts generados, no se manda nada");
            return Ok(());
        }

        /* ---- espera ---- */
        let jobs = JobSet::from_reports(&reports);
        let outcome = monitor::wait_for_jobs(
            ctx.queue.clone(),
            jobs,
            ctx.settings.poll_interval,
            ctx.settings.max_polls,
        )
        .await;
        info!(
            "polling terminado tras {} consultas ({} pendientes)",
            outcome.polls,
            outcome.jobs.pending()
        );
    } else if options.dry_run {
        info!("dry run con merge-only: no hay nada que hacer");
        return Ok(());
    }

    /* ---- merge ---- */
    let merge_ctx = ctx.clone();
    let summary =
        tokio::task::spawn_blocking(move || merge::merge_outputs(&merge_ctx, &tasks)).await??;

    for output in &summary.merged {
        info!("salida final: {}", output.display());
    }
    if let Some(dedup) = &summary.deduplicated {
        info!("salida sin duplicados: {}", dedup.display());
    }

    info!("listo");
    Ok(())
}
