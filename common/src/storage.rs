use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::shell;

/// Entrada de un listado remoto, con la ruta relativa al directorio del usuario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEntry {
    Dir(String),
    File(String),
}

/// Storage element remoto donde los jobs dejan sus salidas.
/// Las rutas son relativas a `<storage_root>/<user>/`.
pub trait RemoteStorage: Send + Sync {
    fn list(&self, path: &str) -> Result<Vec<RemoteEntry>>;

    /// Copia `item` al archivo local `dest`.
    fn copy(&self, item: &str, dest: &Path) -> Result<()>;
}

/// SRM para listar (`lcg-ls`) y dcap para copiar (`dccp`).
#[derive(Debug, Clone)]
pub struct SrmStorage {
    pub endpoint: String,
    pub storage_root: String,
    pub dcap_prefix: String,
    pub user: String,
}

impl SrmStorage {
    pub fn remote_dir(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.storage_root.trim_end_matches('/'),
            self.user,
            path
        )
    }

    pub fn list_url(&self, path: &str) -> String {
        format!("{}?SFN={}", self.endpoint, self.remote_dir(path))
    }

    pub fn copy_source(&self, item: &str) -> String {
        format!(
            "{}/store/user/{}/{}",
            self.dcap_prefix.trim_end_matches('/'),
            self.user,
            item
        )
    }
}

impl RemoteStorage for SrmStorage {
    fn list(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let args = vec!["-l".to_string(), self.list_url(path)];
        let out = shell::run_checked("lcg-ls", &args)?;
        Ok(parse_listing(&out.stdout, path))
    }

    fn copy(&self, item: &str, dest: &Path) -> Result<()> {
        let args = vec![
            self.copy_source(item),
            dest.to_string_lossy().to_string(),
        ];
        shell::run_checked("dccp", &args)?;
        Ok(())
    }
}

/// Parsea `lcg-ls -l`. Las líneas que empiezan con 'd' son directorios; el
/// resto, si contienen `path`, son archivos. En ambos casos se toma el texto
/// desde la primera aparición de `path`.
pub fn parse_listing(output: &str, path: &str) -> Vec<RemoteEntry> {
    let current = path.trim_matches('/');
    let mut entries = Vec::new();

    for line in output.lines() {
        let line = line.trim_end();
        if line.is_empty() || path.is_empty() {
            continue;
        }
        let Some(pos) = line.find(path) else {
            continue;
        };
        let rel = line[pos..].to_string();

        if line.starts_with('d') {
            // algunos SE listan el propio directorio
            if rel.trim_matches('/') != current {
                entries.push(RemoteEntry::Dir(rel));
            }
        } else {
            entries.push(RemoteEntry::File(rel));
        }
    }

    entries
}

/* --------- Herramientas de merge --------- */

pub trait Merger: Send + Sync {
    /// Junta `inputs` en `output` (sobrescribe).
    fn merge(&self, output: &Path, inputs: &[PathBuf]) -> Result<()>;

    /// Quita eventos duplicados de los archivos en `input_dir`.
    fn remove_duplicates(&self, input_dir: &Path, output: &Path) -> Result<String>;
}

/// `hadd` de ROOT y el removedor de duplicados del grupo.
#[derive(Debug, Clone)]
pub struct RootTools {
    pub dedup_tool: String,
}

impl RootTools {
    pub fn hadd_args(output: &Path, inputs: &[PathBuf]) -> Vec<String> {
        let mut args = vec!["-f".to_string(), output.to_string_lossy().to_string()];
        args.extend(inputs.iter().map(|p| p.to_string_lossy().to_string()));
        args
    }
}

impl Merger for RootTools {
    fn merge(&self, output: &Path, inputs: &[PathBuf]) -> Result<()> {
        shell::run_checked("hadd", &Self::hadd_args(output, inputs))?;
        Ok(())
    }

    fn remove_duplicates(&self, input_dir: &Path, output: &Path) -> Result<String> {
        let args = vec![
            "-d".to_string(),
            format!("{}/", input_dir.to_string_lossy().trim_end_matches('/')),
            "-o".to_string(),
            output.to_string_lossy().to_string(),
        ];
        let out = shell::run_checked(&self.dedup_tool, &args)?;
        Ok(out.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
drwxr-xr-x   1     2     2       512  ONLINE /pnfs/psi.ch/cms/trivcat/store/user/pablom/ntuples/DoubleMu
drwxr-xr-x   1     2     2       512  ONLINE /pnfs/psi.ch/cms/trivcat/store/user/pablom/ntuples/TTJets/
-rw-r--r--   1     2     2  10485760  ONLINE /pnfs/psi.ch/cms/trivcat/store/user/pablom/ntuples/summary.root
-rw-r--r--   1     2     2       100  ONLINE /pnfs/psi.ch/cms/trivcat/store/user/otro/README
";

    #[test]
    fn parse_listing_separa_directorios_y_archivos() {
        let entries = parse_listing(LISTING, "ntuples");
        assert_eq!(
            entries,
            vec![
                RemoteEntry::Dir("ntuples/DoubleMu".to_string()),
                RemoteEntry::Dir("ntuples/TTJets/".to_string()),
                RemoteEntry::File("ntuples/summary.root".to_string()),
            ]
        );
    }

    #[test]
    fn parse_listing_ignora_el_propio_directorio() {
        let out = "drwxr-xr-x 1 2 2 512 ONLINE /pnfs/store/user/u/ntuples/DoubleMu/\n";
        assert!(parse_listing(out, "ntuples/DoubleMu").is_empty());
    }

    #[test]
    fn srm_arma_urls_y_origen_de_copia() {
        let se = SrmStorage {
            endpoint: "srm://t3se01.psi.ch:8443/srm/managerv2".to_string(),
            storage_root: "/pnfs/psi.ch/cms/trivcat/store/user/".to_string(),
            dcap_prefix: "dcap://t3se01.psi.ch:22125/pnfs/psi.ch/cms/trivcat".to_string(),
            user: "pablom".to_string(),
        };
        assert_eq!(
            se.list_url("ntuples"),
            "srm://t3se01.psi.ch:8443/srm/managerv2?SFN=/pnfs/psi.ch/cms/trivcat/store/user/pablom/ntuples"
        );
        assert_eq!(
            se.copy_source("ntuples/DoubleMu/output_0.root"),
            "dcap://t3se01.psi.ch:22125/pnfs/psi.ch/cms/trivcat/store/user/pablom/ntuples/DoubleMu/output_0.root"
        );
    }

    #[test]
    fn hadd_args_forzan_sobrescritura() {
        let args = RootTools::hadd_args(
            Path::new("/scratch/u/ntuples/DoubleMu.root"),
            &[PathBuf::from("a.root"), PathBuf::from("b.root")],
        );
        assert_eq!(
            args,
            vec!["-f", "/scratch/u/ntuples/DoubleMu.root", "a.root", "b.root"]
        );
    }
}
