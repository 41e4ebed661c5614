use clap::Parser;
use std::path::PathBuf;

use crate::state::RunOptions;

#[derive(Parser, Debug)]
#[command(name = "runmanager")]
#[command(about = "Parte datasets en jobs, los manda a la cola batch y junta las salidas")]
#[command(after_help = "\
El archivo de configuración tiene una clave por línea:
  ReleasePath  ruta
  Executable   ruta
  NameOfConf   ruta
  NameOfSource ruta
  SrmPath      ruta
  WorkPath     ruta
  HPName       usuario")]
pub struct Cli {
    /// Archivo de configuración de la corrida
    #[arg(value_name = "CONFIGURACION")]
    pub config: PathBuf,

    /// No manda los jobs: solo genera los scripts
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Muestra los comandos de envío y sube el nivel de log
    #[arg(short, long)]
    pub verbose: bool,

    /// Ignora las listas de archivos en caché
    #[arg(short, long)]
    pub renew: bool,

    /// Solo junta las salidas que ya están en el storage
    #[arg(short, long)]
    pub merge_only: bool,
}

impl Cli {
    pub fn options(&self) -> RunOptions {
        RunOptions {
            dry_run: self.dry_run,
            verbose: self.verbose,
            renew: self.renew,
            merge_only: self.merge_only,
        }
    }
}
