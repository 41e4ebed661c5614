use std::{
    fs::{self, File},
    io::BufWriter,
    path::PathBuf,
};

use serde::{Deserialize, Serialize};

use crate::error::{Result, RunError};
use crate::job::{Job, JobId};
use crate::partition::SplitPlan;

pub const MANIFEST_FILE: &str = "jobs.json";

/// Resultado de procesar una tarea en el pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReport {
    /// Nombre de carpeta de la tarea
    pub task: String,
    pub dataset: String,
    /// Directorio donde quedaron los scripts y los logs de los jobs
    pub task_dir: PathBuf,
    pub plan: Option<SplitPlan>,
    pub jobs: Vec<Job>,
    /// Motivo por el que la tarea no produjo jobs
    pub error: Option<String>,
}

impl TaskReport {
    pub fn failed(task: String, dataset: String, task_dir: PathBuf, error: String) -> Self {
        TaskReport {
            task,
            dataset,
            task_dir,
            plan: None,
            jobs: Vec::new(),
            error: Some(error),
        }
    }

    pub fn job_ids(&self) -> Vec<JobId> {
        self.jobs.iter().filter_map(|j| j.job_id).collect()
    }

    /// Escribe `jobs.json` en el directorio de la tarea.
    pub fn write_manifest(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.task_dir).map_err(|e| RunError::io(&self.task_dir, e))?;
        let path = self.task_dir.join(MANIFEST_FILE);
        let file = File::create(&path).map_err(|e| RunError::io(&path, e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(|e| RunError::io(&path, e.into()))?;
        Ok(path)
    }

    #[cfg(test)]
    pub fn read_manifest(path: &std::path::Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| RunError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| RunError::io(path, e.into()))
    }
}
