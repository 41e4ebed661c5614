use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::{Result, RunError};

/// Configuración de una corrida, leída del archivo que se pasa por CLI.
///
/// Formato: una clave por línea seguida de un único valor.
/// ```text
/// ReleasePath  /shome/user/CMSSW_4_2_8/
/// Executable   /shome/user/bin/RunUserAnalyzer
/// NameOfConf   job_template.sh
/// NameOfSource tasks.txt
/// SrmPath      ntuples_2011
/// WorkPath     /shome/user/jobs/
/// HPName       user
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Siempre termina en '/'
    pub release_path: String,
    pub executable: String,
    /// Template del script de cada job
    pub conf_template: PathBuf,
    /// Lista de tareas
    pub task_list: PathBuf,
    /// Subdirectorio en el storage remoto, también raíz del merge
    pub srm_path: String,
    pub work_path: PathBuf,
    /// Usuario del storage remoto
    pub hp_name: String,
}

const KEYS: [&str; 7] = [
    "ReleasePath",
    "Executable",
    "NameOfConf",
    "NameOfSource",
    "SrmPath",
    "WorkPath",
    "HPName",
];

impl RunConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| RunError::io(path, e))?;
        Self::parse(&text)
    }

    /// Las siete claves son obligatorias; claves desconocidas se ignoran
    /// y si una clave se repite gana la última.
    pub fn parse(text: &str) -> Result<Self> {
        let mut values: [Option<String>; 7] = Default::default();

        for line in text.lines() {
            let mut parts = line.split_whitespace();
            let Some(key) = parts.next() else {
                continue;
            };
            if key.starts_with('#') {
                continue;
            }
            let Some(slot) = KEYS.iter().position(|k| *k == key) else {
                continue;
            };
            match parts.next() {
                Some(value) => values[slot] = Some(value.to_string()),
                None => {
                    return Err(RunError::Config(format!("falta el valor de {}", key)));
                }
            }
        }

        let missing: Vec<&str> = KEYS
            .iter()
            .zip(values.iter())
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| *k)
            .collect();
        if !missing.is_empty() {
            return Err(RunError::Config(format!(
                "faltan claves obligatorias: {}",
                missing.join(", ")
            )));
        }

        let [release, exe, conf, source, srm, work, hp] = values.map(Option::unwrap_or_default);

        Ok(RunConfig {
            release_path: fix_path(&release),
            executable: exe,
            conf_template: PathBuf::from(conf),
            task_list: PathBuf::from(source),
            srm_path: srm,
            work_path: PathBuf::from(work),
            hp_name: hp,
        })
    }

    /// Verifica que existan las rutas locales. SrmPath y HPName no se chequean.
    pub fn check_paths(&self) -> Result<()> {
        let checks: [(&'static str, &Path); 5] = [
            ("ReleasePath", Path::new(&self.release_path)),
            ("Executable", Path::new(&self.executable)),
            ("NameOfConf", &self.conf_template),
            ("NameOfSource", &self.task_list),
            ("WorkPath", &self.work_path),
        ];

        for (name, path) in checks {
            if !path.exists() {
                return Err(RunError::MissingPath {
                    name,
                    path: path.to_path_buf(),
                });
            }
        }
        Ok(())
    }
}

/// Agrega '/' al final si no está.
pub fn fix_path(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

/* --------- Parámetros del sitio (variables de entorno) --------- */

pub const DEFAULT_QUEUE: &str = "all.q";
pub const DEFAULT_DBS_URL: &str =
    "http://cmsdbsprod.cern.ch/cms_dbs_ph_analysis_02/servlet/DBSServlet";
pub const DEFAULT_DCAP_PREFIX: &str = "dcap://t3se01.psi.ch:22125/pnfs/psi.ch/cms/trivcat";
pub const DEFAULT_SRM_ENDPOINT: &str = "srm://t3se01.psi.ch:8443/srm/managerv2";
pub const DEFAULT_STORAGE_ROOT: &str = "/pnfs/psi.ch/cms/trivcat/store/user";
pub const DEFAULT_SCRATCH_ROOT: &str = "/scratch";
pub const DEFAULT_DEDUP_TOOL: &str = "/shome/buchmann/material/flash_remove_duplicates.exec";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
/// 300 vueltas de 60s, unas 5 horas
pub const DEFAULT_MAX_POLLS: u32 = 300;

/// Constantes del sitio. Cada una se puede sobreescribir con `RUNMGR_*`.
#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub queue: String,
    pub dbs_url: String,
    pub dcap_prefix: String,
    pub srm_endpoint: String,
    pub storage_root: String,
    pub scratch_root: PathBuf,
    pub dedup_tool: String,
    pub cache_dir: PathBuf,
    pub pool_size: usize,
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub user: Option<String>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl SiteSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let number = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());

        let default_pool = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        SiteSettings {
            queue: text("RUNMGR_QUEUE", DEFAULT_QUEUE),
            dbs_url: text("RUNMGR_DBS_URL", DEFAULT_DBS_URL),
            dcap_prefix: text("RUNMGR_DCAP_PREFIX", DEFAULT_DCAP_PREFIX),
            srm_endpoint: text("RUNMGR_SRM_ENDPOINT", DEFAULT_SRM_ENDPOINT),
            storage_root: text("RUNMGR_STORAGE_ROOT", DEFAULT_STORAGE_ROOT),
            scratch_root: PathBuf::from(text("RUNMGR_SCRATCH_ROOT", DEFAULT_SCRATCH_ROOT)),
            dedup_tool: text("RUNMGR_DEDUP_TOOL", DEFAULT_DEDUP_TOOL),
            cache_dir: PathBuf::from(text("RUNMGR_CACHE_DIR", ".")),
            pool_size: number("RUNMGR_POOL_SIZE")
                .map(|n| n.max(1) as usize)
                .unwrap_or(default_pool),
            poll_interval: Duration::from_secs(
                number("RUNMGR_POLL_INTERVAL_SECS").unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
            max_polls: number("RUNMGR_MAX_POLLS")
                .map(|n| n as u32)
                .unwrap_or(DEFAULT_MAX_POLLS),
            user: lookup("USER").filter(|u| !u.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = "\
ReleasePath /shome/u/CMSSW_4_2_8
Executable /shome/u/bin/RunJZBAnalyzer
NameOfConf job_template.sh
NameOfSource tasks.txt
SrmPath ntuples_2011
WorkPath /shome/u/jobs/
HPName u
";

    #[test]
    fn parse_lee_las_siete_claves() {
        let cfg = RunConfig::parse(SAMPLE).unwrap();
        assert_eq!(cfg.release_path, "/shome/u/CMSSW_4_2_8/");
        assert_eq!(cfg.executable, "/shome/u/bin/RunJZBAnalyzer");
        assert_eq!(cfg.conf_template, PathBuf::from("job_template.sh"));
        assert_eq!(cfg.task_list, PathBuf::from("tasks.txt"));
        assert_eq!(cfg.srm_path, "ntuples_2011");
        assert_eq!(cfg.work_path, PathBuf::from("/shome/u/jobs/"));
        assert_eq!(cfg.hp_name, "u");
    }

    #[test]
    fn parse_ignora_comentarios_lineas_vacias_y_claves_desconocidas() {
        let text = format!("# corrida de prueba\n\nQueue short.q\n{}", SAMPLE);
        assert!(RunConfig::parse(&text).is_ok());
    }

    #[test]
    fn parse_falla_si_falta_una_clave() {
        let text: String = SAMPLE
            .lines()
            .filter(|l| !l.starts_with("HPName"))
            .map(|l| format!("{l}\n"))
            .collect();

        match RunConfig::parse(&text) {
            Err(RunError::Config(msg)) => assert!(msg.contains("HPName")),
            other => panic!("se esperaba error de config, llegó {other:?}"),
        }
    }

    #[test]
    fn parse_falla_si_una_clave_no_tiene_valor() {
        let text = format!("{}SrmPath\n", SAMPLE);
        assert!(matches!(RunConfig::parse(&text), Err(RunError::Config(_))));
    }

    #[test]
    fn check_paths_reporta_la_primera_ruta_faltante() {
        let cfg = RunConfig::parse(SAMPLE).unwrap();
        match cfg.check_paths() {
            Err(RunError::MissingPath { name, .. }) => assert_eq!(name, "ReleasePath"),
            other => panic!("se esperaba MissingPath, llegó {other:?}"),
        }
    }

    #[test]
    fn fix_path_agrega_barra_final() {
        assert_eq!(fix_path("/a/b"), "/a/b/");
        assert_eq!(fix_path("/a/b/"), "/a/b/");
    }

    #[test]
    fn settings_usan_defaults_y_overrides() {
        let env: HashMap<&str, &str> = [
            ("RUNMGR_QUEUE", "short.q"),
            ("RUNMGR_POOL_SIZE", "0"),
            ("RUNMGR_POLL_INTERVAL_SECS", "5"),
            ("RUNMGR_MAX_POLLS", "no-es-numero"),
            ("USER", "pablom"),
        ]
        .into_iter()
        .collect();

        let s = SiteSettings::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(s.queue, "short.q");
        assert_eq!(s.pool_size, 1);
        assert_eq!(s.poll_interval, Duration::from_secs(5));
        assert_eq!(s.max_polls, DEFAULT_MAX_POLLS);
        assert_eq!(s.dbs_url, DEFAULT_DBS_URL);
        assert_eq!(s.user.as_deref(), Some("pablom"));
    }
}
