use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{Result, RunError};

/// Salida capturada de una herramienta externa.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// stdout + stderr, para los mensajes de error
    pub fn combined(&self) -> String {
        let out = self.stdout.trim_end();
        let err = self.stderr.trim_end();
        match (out.is_empty(), err.is_empty()) {
            (_, true) => out.to_string(),
            (true, false) => err.to_string(),
            (false, false) => format!("{}\n{}", out, err),
        }
    }
}

/// Línea de comando legible (solo para logs).
pub fn command_line(program: &str, args: &[String]) -> String {
    let mut line = program.to_string();
    for a in args {
        line.push(' ');
        if a.contains(char::is_whitespace) {
            line.push('"');
            line.push_str(a);
            line.push('"');
        } else {
            line.push_str(a);
        }
    }
    line
}

/// Ejecuta `program` y bloquea hasta que termine. Un estado distinto de 0
/// NO es error acá; ver [`run_checked`].
pub fn run(program: &str, args: &[String]) -> Result<ToolOutput> {
    debug!(command = %command_line(program, args), "ejecutando herramienta externa");

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| RunError::io(program, e))?;

    Ok(ToolOutput {
        // matado por señal -> -1
        status: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Como [`run`], pero un estado distinto de 0 se devuelve como `RunError::Command`.
pub fn run_checked(program: &str, args: &[String]) -> Result<ToolOutput> {
    let out = run(program, args)?;
    if out.success() {
        Ok(out)
    } else {
        Err(RunError::Command {
            command: command_line(program, args),
            status: out.status,
            output: out.combined(),
        })
    }
}

/// Ejecuta con la terminal heredada (la herramienta puede pedir una contraseña).
pub fn run_interactive(program: &str, args: &[String]) -> Result<i32> {
    debug!(command = %command_line(program, args), "ejecutando herramienta interactiva");

    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|e| RunError::io(program, e))?;
    Ok(status.code().unwrap_or(-1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_cita_argumentos_con_espacios() {
        let args = vec![
            "search".to_string(),
            "--query=find file where dataset=/A/B".to_string(),
        ];
        assert_eq!(
            command_line("dbs", &args),
            "dbs search \"--query=find file where dataset=/A/B\""
        );
    }

    #[test]
    fn combined_junta_stdout_y_stderr() {
        let out = ToolOutput {
            status: 1,
            stdout: "algo\n".to_string(),
            stderr: "fallo\n".to_string(),
        };
        assert_eq!(out.combined(), "algo\nfallo");
    }

    #[cfg(unix)]
    #[test]
    fn run_captura_salida_y_estado() {
        let out = run("sh", &["-c".to_string(), "echo hola; exit 3".to_string()]).unwrap();
        assert_eq!(out.status, 3);
        assert_eq!(out.stdout, "hola\n");

        let err = run_checked("sh", &["-c".to_string(), "exit 2".to_string()]).unwrap_err();
        assert!(matches!(err, RunError::Command { status: 2, .. }));
    }

    #[test]
    fn run_con_programa_inexistente_es_error_de_io() {
        let err = run("no-existe-esta-herramienta-xyz", &[]).unwrap_err();
        assert!(matches!(err, RunError::Io { .. }));
    }
}
