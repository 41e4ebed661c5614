use std::{
    collections::{BTreeMap, HashSet},
    path::PathBuf,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::results::TaskReport;

/// Id numérico que asigna la cola batch.
pub type JobId = u64;

/// Un chunk de una tarea ya preparado (y quizás enviado).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub index: u32,
    /// Nombre en la cola, ej: "RMG3DoubleMu_Run2011A"
    pub name: String,
    pub files: Vec<String>,
    pub config_path: PathBuf,
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,

    /// None en dry-run o si el envío falló
    pub job_id: Option<JobId>,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedJob {
    pub task: String,
    pub index: u32,
    pub state: JobState,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Todos los jobs enviados en la corrida, de todas las tareas.
/// Solo lo modifica el loop de polling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSet {
    jobs: BTreeMap<JobId, TrackedJob>,
}

impl JobSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Junta los ids que devolvió la fase de envío.
    pub fn from_reports(reports: &[TaskReport]) -> Self {
        let mut set = Self::new();
        for report in reports {
            for job in &report.jobs {
                if let Some(id) = job.job_id {
                    set.insert(id, &report.task, job.index);
                }
            }
        }
        set
    }

    pub fn insert(&mut self, id: JobId, task: &str, index: u32) {
        self.jobs.insert(
            id,
            TrackedJob {
                task: task.to_string(),
                index,
                state: JobState::Pending,
                finished_at: None,
            },
        );
    }

    pub fn total(&self) -> usize {
        self.jobs.len()
    }

    pub fn pending(&self) -> usize {
        self.jobs
            .values()
            .filter(|j| j.state == JobState::Pending)
            .count()
    }

    pub fn is_done(&self) -> bool {
        self.pending() == 0
    }

    pub fn pending_ids(&self) -> Vec<JobId> {
        self.jobs
            .iter()
            .filter(|(_, j)| j.state == JobState::Pending)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn get(&self, id: JobId) -> Option<&TrackedJob> {
        self.jobs.get(&id)
    }

    /// Aplica un listado de la cola: todo job pendiente que ya no aparece
    /// como activo pasa a Finished. Devuelve los ids que terminaron ahora.
    pub fn update(&mut self, active: &HashSet<JobId>) -> Vec<JobId> {
        let now = Utc::now();
        let mut finished = Vec::new();

        for (id, job) in self.jobs.iter_mut() {
            if job.state == JobState::Pending && !active.contains(id) {
                job.state = JobState::Finished;
                job.finished_at = Some(now);
                finished.push(*id);
            }
        }

        finished
    }
}
