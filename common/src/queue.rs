use std::{collections::HashSet, path::PathBuf};

use crate::error::{Result, RunError};
use crate::job::JobId;
use crate::shell;

/// Pedido de envío de un job a la cola.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub name: String,
    pub script: PathBuf,
    pub stdout: PathBuf,
    pub stderr: PathBuf,
    /// Argumentos para el script (el índice del job)
    pub args: Vec<String>,
}

/// Cola batch. El parseo del texto de las herramientas queda detrás de esto.
pub trait BatchQueue: Send + Sync {
    /// Envía y devuelve el id que asignó la cola.
    fn submit(&self, req: &SubmitRequest) -> Result<JobId>;

    /// Ids de los jobs del usuario que la cola todavía tiene activos.
    fn active_jobs(&self) -> Result<HashSet<JobId>>;

    /// Comando de envío, para mostrarlo en modo verbose.
    fn describe(&self, req: &SubmitRequest) -> String;
}

/// Sun Grid Engine: `qsub` / `qstat`.
#[derive(Debug, Clone)]
pub struct SgeQueue {
    pub queue: String,
    pub user: String,
}

impl SgeQueue {
    pub fn new(queue: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            user: user.into(),
        }
    }

    pub fn submit_args(&self, req: &SubmitRequest) -> Vec<String> {
        let mut args = vec![
            "-q".to_string(),
            self.queue.clone(),
            "-N".to_string(),
            req.name.clone(),
            "-o".to_string(),
            req.stdout.to_string_lossy().to_string(),
            "-e".to_string(),
            req.stderr.to_string_lossy().to_string(),
            req.script.to_string_lossy().to_string(),
        ];
        args.extend(req.args.iter().cloned());
        args
    }
}

impl BatchQueue for SgeQueue {
    fn submit(&self, req: &SubmitRequest) -> Result<JobId> {
        let out = shell::run_checked("qsub", &self.submit_args(req))?;
        parse_submit_ack(&out.stdout).ok_or_else(|| RunError::Parse {
            tool: "qsub",
            output: out.combined(),
        })
    }

    fn active_jobs(&self) -> Result<HashSet<JobId>> {
        let out = shell::run_checked("qstat", &["-u".to_string(), self.user.clone()])?;
        Ok(parse_active_ids(&out.stdout))
    }

    fn describe(&self, req: &SubmitRequest) -> String {
        shell::command_line("qsub", &self.submit_args(req))
    }
}

/// `Your job 4711 ("RMG0Foo") has been submitted` -> 4711
pub fn parse_submit_ack(output: &str) -> Option<JobId> {
    output
        .lines()
        .filter(|l| l.contains("Your job"))
        .find_map(|l| {
            let start = l.find("job ")? + "job ".len();
            let end = l[start..].find(" (")? + start;
            l[start..end].trim().parse::<JobId>().ok()
        })
}

/// Primera columna de cada fila de `qstat` que sea un id numérico.
/// Encabezados y separadores se ignoran.
pub fn parse_active_ids(output: &str) -> HashSet<JobId> {
    output
        .lines()
        .filter_map(|l| l.split_whitespace().next())
        .filter_map(|tok| tok.parse::<JobId>().ok())
        .collect()
}
