use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, RunError};

/// Valor que marca la columna "no definida" en la lista de tareas.
pub const UNSET: i64 = -1;

/// Cómo partir el dataset: número de jobs fijo o archivos por job fijo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Jobs(u32),
    FilesPerJob(u32),
}

/// Una línea de la lista de tareas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub dataset: String,
    /// Texto entre las comillas simples, se pasa tal cual al ejecutable
    pub arguments: String,
    pub split: Split,
}

impl Task {
    /// Nombre de carpeta local/remota de la tarea:
    /// `/Foo/bar-v1/USER` -> `Foo_bar-v1`
    pub fn folder_name(&self) -> String {
        let name = self.dataset.trim_start_matches('/');
        let name = name.strip_suffix("/USER").unwrap_or(name);
        name.trim_end_matches('/').replace('/', "_")
    }

    /// Datasets de datos reales (no simulación).
    pub fn is_data(&self) -> bool {
        self.dataset.contains("/data/")
    }
}

pub fn read_task_list(path: &Path) -> Result<Vec<Task>> {
    let text = fs::read_to_string(path).map_err(|e| RunError::io(path, e))?;
    Ok(parse_task_list(&text))
}

/// Parsea la lista de tareas. Las líneas mal formadas se registran y se saltan.
///
/// Formato: `dataset 'argumentos' jobs archivos_por_job`, con exactamente una
/// de las dos columnas numéricas en -1.
pub fn parse_task_list(text: &str) -> Vec<Task> {
    let mut tasks = Vec::new();

    for (n, line) in text.lines().enumerate() {
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        match parse_task_line(line) {
            Ok(task) => tasks.push(task),
            Err(reason) => warn!("ignorando la línea {}: {} ({})", n + 1, line.trim(), reason),
        }
    }

    tasks
}

fn parse_task_line(line: &str) -> std::result::Result<Task, String> {
    let (begin, end) = match (line.find('\''), line.rfind('\'')) {
        (Some(b), Some(e)) if b != e => (b, e),
        _ => return Err("faltan los argumentos entre comillas".to_string()),
    };

    let dataset = line[..begin]
        .split_whitespace()
        .next()
        .ok_or_else(|| "falta el dataset".to_string())?;

    let arguments = &line[begin + 1..end];

    let numbers: Vec<&str> = line[end + 1..].split_whitespace().collect();
    if numbers.len() != 2 {
        return Err(format!(
            "se esperaban 2 columnas numéricas, hay {}",
            numbers.len()
        ));
    }
    let parse = |s: &str| {
        s.parse::<i64>()
            .map_err(|_| format!("'{}' no es un número", s))
    };
    let jobs = parse(numbers[0])?;
    let per_job = parse(numbers[1])?;

    let split = match (jobs, per_job) {
        (UNSET, UNSET) => return Err("las dos columnas están en -1".to_string()),
        (j, UNSET) if j > 0 => Split::Jobs(to_u32(j)?),
        (UNSET, f) if f > 0 => Split::FilesPerJob(to_u32(f)?),
        (j, f) if j != UNSET && f != UNSET => {
            return Err("una de las dos columnas debe ser -1".to_string())
        }
        _ => return Err("la columna definida debe ser positiva".to_string()),
    };

    Ok(Task {
        dataset: dataset.to_string(),
        arguments: arguments.to_string(),
        split,
    })
}

fn to_u32(n: i64) -> std::result::Result<u32, String> {
    u32::try_from(n).map_err(|_| format!("{} fuera de rango", n))
}
