use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, RunError};
use crate::shell;

/// Catálogo remoto de datasets: devuelve la respuesta cruda, un archivo por línea.
pub trait Catalog: Send + Sync {
    fn query(&self, dataset: &str) -> Result<String>;
}

/// Catálogo DBS, vía `dbs search`.
#[derive(Debug, Clone)]
pub struct DbsCatalog {
    pub url: String,
}

impl DbsCatalog {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn args(&self, dataset: &str) -> Vec<String> {
        vec![
            "search".to_string(),
            format!("--query=find file where dataset={}", dataset),
            "--noheader".to_string(),
            format!("--url={}", self.url),
        ]
    }
}

impl Catalog for DbsCatalog {
    fn query(&self, dataset: &str) -> Result<String> {
        let out = shell::run_checked("dbs", &self.args(dataset))?;
        Ok(out.stdout)
    }
}

/* --------- Lista de archivos con caché local --------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileListSource {
    Cache,
    Catalog,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileList {
    pub dataset: String,
    pub source: FileListSource,
    /// Entradas tal como vienen del catálogo, en orden
    pub entries: Vec<String>,
}

impl FileList {
    /// Rutas que ve el job: cada entrada con el prefijo de la puerta dcap.
    pub fn input_paths(&self, dcap_prefix: &str) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| format!("{}{}", dcap_prefix, e))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `.` + dataset con '/' y '?' cambiados por '_'
pub fn cache_file_name(dataset: &str) -> String {
    format!(".{}", dataset.replace(['/', '?'], "_"))
}

pub struct FileListResolver<'a> {
    catalog: &'a dyn Catalog,
    cache_dir: PathBuf,
    renew: bool,
}

impl<'a> FileListResolver<'a> {
    pub fn new(catalog: &'a dyn Catalog, cache_dir: impl Into<PathBuf>, renew: bool) -> Self {
        Self {
            catalog,
            cache_dir: cache_dir.into(),
            renew,
        }
    }

    pub fn cache_path(&self, dataset: &str) -> PathBuf {
        self.cache_dir.join(cache_file_name(dataset))
    }

    /// Lee la caché si existe (y no se pidió renovarla); si no, consulta el
    /// catálogo y guarda la respuesta cruda. Lista vacía -> `EmptyDataset`.
    pub fn resolve(&self, dataset: &str) -> Result<FileList> {
        let cache = self.cache_path(dataset);

        let (raw, source) = if !self.renew && cache.is_file() {
            info!(
                "leyendo archivos de {} desde la caché {}",
                dataset,
                cache.display()
            );
            let raw = fs::read_to_string(&cache).map_err(|e| RunError::io(&cache, e))?;
            (raw, FileListSource::Cache)
        } else {
            info!("pidiendo al catálogo la lista de archivos de {}", dataset);
            let raw = self.catalog.query(dataset)?;
            write_cache(&cache, &raw);
            (raw, FileListSource::Catalog)
        };

        let list = FileList {
            dataset: dataset.to_string(),
            source,
            entries: parse_entries(&raw),
        };
        if list.is_empty() {
            return Err(RunError::EmptyDataset(dataset.to_string()));
        }

        Ok(list)
    }
}

fn write_cache(path: &Path, raw: &str) {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("no se pudo crear {}: {}", parent.display(), e);
            }
        }
    }
    if let Err(e) = fs::write(path, raw) {
        warn!("no se pudo escribir la caché {}: {}", path.display(), e);
    }
}

fn parse_entries(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn temp_dir(sub: &str) -> PathBuf {
        let base = std::env::temp_dir().join("catalog_tests").join(sub);
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        base
    }

    struct FakeCatalog {
        response: String,
        calls: AtomicUsize,
    }

    impl FakeCatalog {
        fn new(response: &str) -> Self {
            Self {
                response: response.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Catalog for FakeCatalog {
        fn query(&self, _dataset: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    const DATASET: &str = "/DoubleMu/Run2011A-v1/USER";

    #[test]
    fn cache_file_name_sanea_el_dataset() {
        assert_eq!(cache_file_name("/A/B?x=1/USER"), "._A_B_x=1_USER");
    }

    #[test]
    fn segunda_resolucion_lee_la_cache() {
        let dir = temp_dir("idempotente");
        let catalog = FakeCatalog::new("/store/a.root\n/store/b.root\n\n");
        let resolver = FileListResolver::new(&catalog, &dir, false);

        let first = resolver.resolve(DATASET).unwrap();
        let second = resolver.resolve(DATASET).unwrap();

        assert_eq!(first.source, FileListSource::Catalog);
        assert_eq!(second.source, FileListSource::Cache);
        assert_eq!(first.entries, second.entries);
        assert_eq!(first.entries, vec!["/store/a.root", "/store/b.root"]);
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 1);
        assert!(dir.join("._DoubleMu_Run2011A-v1_USER").is_file());
    }

    #[test]
    fn renew_ignora_la_cache() {
        let dir = temp_dir("renew");
        fs::write(dir.join(cache_file_name(DATASET)), "/store/viejo.root\n").unwrap();

        let catalog = FakeCatalog::new("/store/nuevo.root\n");
        let list = FileListResolver::new(&catalog, &dir, true)
            .resolve(DATASET)
            .unwrap();

        assert_eq!(list.entries, vec!["/store/nuevo.root"]);
        assert_eq!(
            fs::read_to_string(dir.join(cache_file_name(DATASET))).unwrap(),
            "/store/nuevo.root\n"
        );
    }

    #[test]
    fn dataset_vacio_es_error() {
        let dir = temp_dir("vacio");
        let catalog = FakeCatalog::new("\n");
        let err = FileListResolver::new(&catalog, &dir, false)
            .resolve(DATASET)
            .unwrap_err();
        assert!(matches!(err, RunError::EmptyDataset(ds) if ds == DATASET));
    }

    #[test]
    fn input_paths_agrega_el_prefijo_dcap() {
        let list = FileList {
            dataset: DATASET.to_string(),
            source: FileListSource::Cache,
            entries: vec!["/store/a.root".to_string()],
        };
        assert_eq!(
            list.input_paths("dcap://se:22125/pnfs"),
            vec!["dcap://se:22125/pnfs/store/a.root"]
        );
    }

    #[test]
    fn dbs_arma_la_consulta() {
        let dbs = DbsCatalog::new("http://dbs/servlet");
        assert_eq!(
            dbs.args("/A/B"),
            vec![
                "search",
                "--query=find file where dataset=/A/B",
                "--noheader",
                "--url=http://dbs/servlet"
            ]
        );
    }
}
