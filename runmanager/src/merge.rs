use anyhow::{Context, Result};
use common::{RemoteEntry, RunError, Task};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

use crate::state::RunContext;

/// Archivos finales que produjo la fase de merge.
#[derive(Debug, Default)]
pub struct MergeSummary {
    pub merged: Vec<PathBuf>,
    pub deduplicated: Option<PathBuf>,
}

/// Recorre el storage remoto desde `SrmPath` y junta cada directorio con
/// salidas en un único archivo en scratch.
///
/// Un archivo que no se pudo copiar solo se registra; si al final la cantidad
/// de archivos locales no coincide se aborta todo el merge.
pub fn merge_outputs(ctx: &RunContext, tasks: &[Task]) -> Result<MergeSummary> {
    let mut summary = MergeSummary::default();
    let merger = DirectoryMerger::new(ctx);

    merger.walk(&ctx.config.srm_path, &mut summary)?;

    if needs_dedup(ctx, tasks) {
        info!("son datos de RunJZBAnalyzer: falta juntar y sacar duplicados");
        let input_dir = merger.ntuples_root.join(&ctx.config.srm_path);
        let output = merger
            .user_scratch
            .join(format!("{}.root", ctx.config.srm_path.trim_end_matches('/')));

        match ctx.merger.remove_duplicates(&input_dir, &output) {
            Ok(log) => {
                for line in log.lines() {
                    info!("{}", line);
                }
                summary.deduplicated = Some(output);
            }
            Err(e) => warn!("falló la remoción de duplicados: {}", e),
        }
    }

    Ok(summary)
}

/// La remoción de duplicados solo aplica a datos reales de RunJZBAnalyzer.
/// Con `--merge-only` no se procesan tareas, así que nunca se marca la
/// corrida como de datos.
pub fn needs_dedup(ctx: &RunContext, tasks: &[Task]) -> bool {
    if ctx.options.merge_only {
        return false;
    }
    tasks.iter().any(Task::is_data) && ctx.config.executable.contains("RunJZBAnalyzer")
}

struct DirectoryMerger<'a> {
    ctx: &'a RunContext,
    /// <scratch>/<usuario>
    user_scratch: PathBuf,
    /// <scratch>/<usuario>/ntuples
    ntuples_root: PathBuf,
}

impl<'a> DirectoryMerger<'a> {
    fn new(ctx: &'a RunContext) -> Self {
        let user_scratch = ctx.settings.scratch_root.join(&ctx.config.hp_name);
        let ntuples_root = user_scratch.join("ntuples");
        Self {
            ctx,
            user_scratch,
            ntuples_root,
        }
    }

    /// Recorrido en profundidad. Primero los subdirectorios, después el
    /// directorio actual si tiene archivos propios.
    fn walk(&self, path: &str, summary: &mut MergeSummary) -> Result<()> {
        info!("revisando el subdirectorio {}", path);

        let entries = match self.ctx.storage.list(path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("no se pudo listar {}: {}", path, e);
                return Ok(());
            }
        };

        let mut files = Vec::new();
        for entry in entries {
            match entry {
                RemoteEntry::Dir(sub) => self.walk(&sub, summary)?,
                RemoteEntry::File(item) => files.push(item),
            }
        }

        if !files.is_empty() {
            info!("  --> se van a juntar {} archivos de {}", files.len(), path);
            let output = self.join_directory(path, &files)?;
            summary.merged.push(output);
        }

        Ok(())
    }

    /// Copia, verifica, junta y borra la copia local.
    ///
    /// Solo se cuentan y se borran los archivos de esta llamada: las salidas
    /// ya unidas de los subdirectorios viven en la misma carpeta local.
    fn join_directory(&self, path: &str, files: &[String]) -> Result<PathBuf> {
        let local_dir = self.ntuples_root.join(path);
        fs::create_dir_all(&local_dir)
            .with_context(|| format!("creando {}", local_dir.display()))?;

        // 1) copiar todo; un fallo no corta el loop
        let mut locals = Vec::with_capacity(files.len());
        for item in files {
            let dest = self.ntuples_root.join(item);
            // restos de una corrida anterior no cuentan como copiados
            if dest.is_file() {
                fs::remove_file(&dest)
                    .with_context(|| format!("borrando la copia vieja {}", dest.display()))?;
            }
            if let Err(e) = self.ctx.storage.copy(item, &dest) {
                warn!("error en la copia de {}: {}", item, e);
            }
            locals.push(dest);
        }

        // 2) asegurarse de que llegó todo
        let copied = locals.iter().filter(|p| p.is_file()).count();
        if copied != files.len() {
            return Err(RunError::TransferMismatch {
                copied,
                expected: files.len(),
            }
            .into());
        }

        // 3) merge
        let output = self
            .ntuples_root
            .join(format!("{}.root", path.trim_end_matches('/')));
        match self.ctx.merger.merge(&output, &locals) {
            Ok(()) => info!("salida unida en {}", output.display()),
            Err(e) => warn!("falló el merge de {}: {}", path, e),
        }

        // 4) limpiar las copias; la carpeta solo si quedó vacía
        for local in &locals {
            if let Err(e) = fs::remove_file(local) {
                warn!("no se pudo borrar {}: {}", local.display(), e);
            }
        }
        if let Err(e) = fs::remove_dir(&local_dir) {
            debug!("la carpeta {} queda: {}", local_dir.display(), e);
        }

        Ok(output)
    }
}
