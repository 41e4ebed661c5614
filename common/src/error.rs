use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errores del run manager.
///
/// Los fatales (`Config`, `MissingPath`, `Credential`, `TransferMismatch`)
/// terminan el proceso; el resto se registra por tarea y se sigue.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("error de configuración: {0}")]
    Config(String),

    #[error("problema con {name}, que apunta a {path}: no existe")]
    MissingPath { name: &'static str, path: PathBuf },

    #[error("problema con el proxy: {0}")]
    Credential(String),

    #[error("no se encontraron archivos para el dataset {0}")]
    EmptyDataset(String),

    #[error("partición inválida: {0}")]
    Partition(String),

    #[error("el job {index} quedó sin archivos de entrada")]
    EmptyChunk { index: u32 },

    #[error("error en template: {0}")]
    Template(String),

    #[error("`{command}` terminó con estado {status}: {output}")]
    Command {
        command: String,
        status: i32,
        output: String,
    },

    #[error("salida inesperada de {tool}: {output}")]
    Parse { tool: &'static str, output: String },

    #[error("no se transfirieron todos los archivos ({copied} de {expected})")]
    TransferMismatch { copied: usize, expected: usize },

    #[error("error de E/S en {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl RunError {
    /// Envuelve un `io::Error` con la ruta que lo provocó.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        RunError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, RunError>;
