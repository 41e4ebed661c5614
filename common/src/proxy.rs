use tracing::{info, warn};

use crate::error::{Result, RunError};
use crate::shell;

/// Más de 3 horas de vida alcanza.
pub const MIN_TIME_LEFT_SECS: u64 = 10_800;
/// Valores absurdos los tratamos como proxy roto.
pub const MAX_TIME_LEFT_SECS: u64 = 1_000_000;

/// Herramienta del proxy de grid.
pub trait ProxyTool: Send + Sync {
    /// Salida cruda de la consulta de tiempo restante.
    fn time_left(&self) -> Result<String>;

    fn renew(&self) -> Result<()>;
}

/// `voms-proxy-info` / `voms-proxy-init`.
#[derive(Debug, Clone, Default)]
pub struct VomsProxy;

impl ProxyTool for VomsProxy {
    fn time_left(&self) -> Result<String> {
        // sin proxy la herramienta sale con error; el texto igual sirve
        let out = shell::run("voms-proxy-info", &["-timeleft".to_string()])?;
        Ok(out.combined())
    }

    fn renew(&self) -> Result<()> {
        let args: Vec<String> = ["-voms", "cms", "-hours", "120"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let status = shell::run_interactive("voms-proxy-init", &args)?;
        if status != 0 {
            return Err(RunError::Credential(format!(
                "voms-proxy-init terminó con estado {}",
                status
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyStatus {
    Valid { seconds: u64 },
    NeedsRenewal { seconds: Option<u64> },
}

/// Interpreta la salida de `voms-proxy-info -timeleft`.
pub fn classify(output: &str) -> Result<ProxyStatus> {
    if output.contains("java") {
        return Err(RunError::Credential(format!(
            "java está teniendo problemas, reintentar más tarde: {}",
            output.trim()
        )));
    }

    let seconds = output
        .split_whitespace()
        .last()
        .and_then(|tok| tok.parse::<f64>().ok())
        .filter(|s| *s >= 0.0)
        .map(|s| s as u64);

    Ok(match seconds {
        Some(s) if s > MIN_TIME_LEFT_SECS && s < MAX_TIME_LEFT_SECS => {
            ProxyStatus::Valid { seconds: s }
        }
        other => ProxyStatus::NeedsRenewal { seconds: other },
    })
}

/// Verifica el proxy y lo renueva si le queda poco.
pub fn ensure_proxy(tool: &dyn ProxyTool) -> Result<ProxyStatus> {
    let status = classify(&tool.time_left()?)?;

    match status {
        ProxyStatus::Valid { seconds } => {
            info!("el proxy vive {} segundos más, alcanza", seconds);
        }
        ProxyStatus::NeedsRenewal { seconds } => {
            warn!(
                "hay que renovar el proxy (tiempo restante: {:?}), corriendo voms-proxy-init",
                seconds
            );
            tool.renew()?;
        }
    }

    Ok(status)
}
