use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{Result, RunError};

/// Marcadores que reconoce el template del script de cada job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Placeholder {
    SourceFiles,
    JobDir,
    Executable,
    SrmDir,
    HpName,
    Arguments,
    Release,
}

impl Placeholder {
    pub const ALL: [Placeholder; 7] = [
        Placeholder::SourceFiles,
        Placeholder::JobDir,
        Placeholder::Executable,
        Placeholder::SrmDir,
        Placeholder::HpName,
        Placeholder::Arguments,
        Placeholder::Release,
    ];

    /// Texto literal del marcador dentro del template.
    pub fn token(self) -> &'static str {
        match self {
            Placeholder::SourceFiles => "sourcefile",
            Placeholder::JobDir => "jobdir",
            Placeholder::Executable => "exefile",
            Placeholder::SrmDir => "srmdir",
            Placeholder::HpName => "hpname",
            Placeholder::Arguments => "argumentsname",
            Placeholder::Release => "therelease",
        }
    }
}

pub type Substitutions = BTreeMap<Placeholder, String>;

/// Template del script de un job, cargado una vez por tarea.
#[derive(Debug, Clone)]
pub struct ConfigTemplate {
    text: String,
}

impl ConfigTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| RunError::io(path, e))?;
        Ok(Self::new(text))
    }

    /// Marcadores que aparecen al menos una vez en el template.
    pub fn placeholders(&self) -> Vec<Placeholder> {
        Placeholder::ALL
            .into_iter()
            .filter(|p| self.text.contains(p.token()))
            .collect()
    }

    /// Reemplaza todos los marcadores en una sola pasada de izquierda a
    /// derecha. Lo que se inserta no se vuelve a escanear.
    /// Falta un valor para algún marcador -> `RunError::Template`.
    pub fn render(&self, values: &Substitutions) -> Result<String> {
        let missing: Vec<&str> = Placeholder::ALL
            .iter()
            .filter(|p| !values.contains_key(*p))
            .map(|p| p.token())
            .collect();
        if !missing.is_empty() {
            return Err(RunError::Template(format!(
                "faltan valores para: {}",
                missing.join(", ")
            )));
        }

        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();

        while !rest.is_empty() {
            // el primer marcador que arranca en esta posición; los tokens no
            // son prefijo uno de otro, así que no hay ambigüedad
            let hit = Placeholder::ALL
                .iter()
                .find(|p| rest.starts_with(p.token()));

            match hit {
                Some(p) => {
                    out.push_str(&values[p]);
                    rest = &rest[p.token().len()..];
                }
                None => {
                    let mut chars = rest.chars();
                    if let Some(c) = chars.next() {
                        out.push(c);
                    }
                    rest = chars.as_str();
                }
            }
        }

        Ok(out)
    }
}

/// Nombre del script del job `index`: `job.sh` -> `job_3.sh`.
pub fn instance_file_name(template: &Path, index: u32) -> String {
    let stem = template
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "job".to_string());

    match template.extension() {
        Some(ext) => format!("{}_{}.{}", stem, index, ext.to_string_lossy()),
        None => format!("{}_{}", stem, index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "\
#!/bin/bash
cd therelease
eval `scramv1 runtime -sh`
FILES=sourcefile
OUT=/scratch/hpname/jobdir
exefile -o $OUT/output.root argumentsname $FILES
lcg-cp $OUT/output.root srm://se/store/user/hpname/srmdir/
";

    fn values() -> Substitutions {
        [
            (Placeholder::SourceFiles, "\"a.root b.root \""),
            (Placeholder::JobDir, "DoubleMu/ntuples_0"),
            (Placeholder::Executable, "/bin/RunUserAnalyzer"),
            (Placeholder::SrmDir, "ntuples/DoubleMu"),
            (Placeholder::HpName, "pablom"),
            (Placeholder::Arguments, "\"-c 1\""),
            (Placeholder::Release, "/cmssw/"),
        ]
        .into_iter()
        .map(|(p, v)| (p, v.to_string()))
        .collect()
    }

    #[test]
    fn render_reemplaza_cada_marcador() {
        let out = ConfigTemplate::new(TEMPLATE).render(&values()).unwrap();

        for p in Placeholder::ALL {
            assert!(!out.contains(p.token()), "sobrevivió {}", p.token());
        }
        assert!(out.contains("cd /cmssw/\n"));
        assert!(out.contains("OUT=/scratch/pablom/DoubleMu/ntuples_0\n"));
        assert!(out.contains("/bin/RunUserAnalyzer -o $OUT/output.root \"-c 1\" $FILES"));
        assert!(out.contains("srm://se/store/user/pablom/ntuples/DoubleMu/"));
    }

    #[test]
    fn render_no_reescanea_lo_insertado() {
        let mut vals = values();
        vals.insert(Placeholder::HpName, "user_with_jobdir".to_string());

        let out = ConfigTemplate::new("hpname jobdir").render(&vals).unwrap();
        assert_eq!(out, "user_with_jobdir DoubleMu/ntuples_0");
    }

    #[test]
    fn render_falla_si_falta_un_valor() {
        let mut vals = values();
        vals.remove(&Placeholder::Release);

        match ConfigTemplate::new(TEMPLATE).render(&vals) {
            Err(RunError::Template(msg)) => assert!(msg.contains("therelease")),
            other => panic!("se esperaba error de template, llegó {other:?}"),
        }
    }

    #[test]
    fn render_respeta_texto_no_ascii() {
        let out = ConfigTemplate::new("# análisis ñ exefile")
            .render(&values())
            .unwrap();
        assert_eq!(out, "# análisis ñ /bin/RunUserAnalyzer");
    }

    #[test]
    fn placeholders_lista_los_presentes() {
        let t = ConfigTemplate::new("exefile hpname");
        assert_eq!(
            t.placeholders(),
            vec![Placeholder::Executable, Placeholder::HpName]
        );
    }

    #[test]
    fn instance_file_name_inserta_el_indice() {
        assert_eq!(instance_file_name(Path::new("cfg/job.sh"), 3), "job_3.sh");
        assert_eq!(instance_file_name(Path::new("runjob"), 0), "runjob_0");
    }
}
