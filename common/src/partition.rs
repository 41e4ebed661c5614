use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RunError};
use crate::task::Split;

/// Reparto de los N archivos de una tarea entre sus jobs.
///
/// Los jobs con índice mayor que `number_of_jobs - overloaded_jobs` son los
/// "sobrecargados": reciben un archivo extra para absorber el resto de N/J.
/// En modo archivos-por-job `overloaded_jobs` puede quedar <= 0; en ese caso
/// no hay jobs sobrecargados y el último se queda con lo que sobra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPlan {
    pub files_per_job: u32,
    pub number_of_jobs: u32,
    pub overloaded_jobs: i64,
}

impl SplitPlan {
    pub fn compute(n_files: usize, split: Split) -> Result<Self> {
        if n_files == 0 {
            return Err(RunError::Partition("no hay archivos que repartir".to_string()));
        }
        let n = n_files as i64;

        let plan = match split {
            Split::Jobs(0) | Split::FilesPerJob(0) => {
                return Err(RunError::Partition(format!("{:?} no es válido", split)));
            }
            // menos archivos que jobs: un archivo por job
            Split::Jobs(j) if n < j as i64 => SplitPlan {
                files_per_job: 1,
                number_of_jobs: n_files as u32,
                overloaded_jobs: 0,
            },
            Split::Jobs(j) => {
                let per_job = n / j as i64;
                SplitPlan {
                    files_per_job: to_u32(per_job)?,
                    number_of_jobs: j,
                    overloaded_jobs: n + 1 - per_job * j as i64,
                }
            }
            Split::FilesPerJob(f) => {
                let jobs = n / f as i64 + 1;
                SplitPlan {
                    files_per_job: f,
                    number_of_jobs: to_u32(jobs)?,
                    overloaded_jobs: n + 1 - f as i64 * jobs,
                }
            }
        };

        Ok(plan)
    }

    /// Rango contiguo de archivos del job `index`, recortado a `n_files`.
    /// Puede quedar vacío (último job en modo archivos-por-job).
    pub fn chunk_range(&self, index: u32, n_files: usize) -> Range<usize> {
        let n = n_files as i64;
        let per_job = self.files_per_job as i64;
        let normal = self.number_of_jobs as i64 - self.overloaded_jobs;
        let i = index as i64;

        let (start, len) = if !self.is_overloaded(index) {
            (i * per_job, per_job)
        } else {
            (per_job * normal + (per_job + 1) * (i - normal) - 1, per_job + 1)
        };

        let start = start.clamp(0, n);
        let end = (start + len).min(n);
        start as usize..end as usize
    }

    /// Un slice por job, en orden.
    pub fn chunks<'a, T>(&self, files: &'a [T]) -> Vec<&'a [T]> {
        (0..self.number_of_jobs)
            .map(|i| &files[self.chunk_range(i, files.len())])
            .collect()
    }

    /// Los jobs del final reciben un archivo extra.
    pub fn is_overloaded(&self, index: u32) -> bool {
        index as i64 > self.number_of_jobs as i64 - self.overloaded_jobs
    }
}

fn to_u32(n: i64) -> Result<u32> {
    u32::try_from(n).map_err(|_| RunError::Partition(format!("{} fuera de rango", n)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{i}.root")).collect()
    }

    #[test]
    fn ejemplo_diez_archivos_tres_jobs() {
        let plan = SplitPlan::compute(10, Split::Jobs(3)).unwrap();
        assert_eq!(plan.files_per_job, 3);
        assert_eq!(plan.overloaded_jobs, 2);
        assert_eq!(plan.number_of_jobs, 3);

        let all = files(10);
        let chunks = plan.chunks(&all);
        assert_eq!(chunks[0], &all[0..3]);
        assert_eq!(chunks[1], &all[3..6]);
        assert_eq!(chunks[2], &all[6..10]);
        assert!(plan.is_overloaded(2));
        assert!(!plan.is_overloaded(1));
    }

    #[test]
    fn modo_jobs_cubre_todos_los_archivos_sin_jobs_vacios() {
        for n in 1..=60usize {
            for j in 1..=20u32 {
                let plan = SplitPlan::compute(n, Split::Jobs(j)).unwrap();
                let all = files(n);
                let chunks = plan.chunks(&all);

                let total: usize = chunks.iter().map(|c| c.len()).sum();
                assert_eq!(total, n, "n={n} j={j}");
                assert!(chunks.iter().all(|c| !c.is_empty()), "n={n} j={j}");

                // contiguos y en orden
                let flat: Vec<&String> = chunks.iter().flat_map(|c| c.iter()).collect();
                assert_eq!(flat, all.iter().collect::<Vec<_>>(), "n={n} j={j}");
            }
        }
    }

    #[test]
    fn jobs_sobrecargados_reciben_un_archivo_extra() {
        for n in 1..=60usize {
            for j in 1..=20u32 {
                let plan = SplitPlan::compute(n, Split::Jobs(j)).unwrap();
                for i in 0..plan.number_of_jobs {
                    let len = plan.chunk_range(i, n).len() as u32;
                    if plan.is_overloaded(i) {
                        assert_eq!(len, plan.files_per_job + 1, "n={n} j={j} i={i}");
                    } else {
                        assert_eq!(len, plan.files_per_job, "n={n} j={j} i={i}");
                    }
                }
            }
        }
    }

    #[test]
    fn menos_archivos_que_jobs_da_un_archivo_por_job() {
        let plan = SplitPlan::compute(4, Split::Jobs(10)).unwrap();
        assert_eq!(
            plan,
            SplitPlan {
                files_per_job: 1,
                number_of_jobs: 4,
                overloaded_jobs: 0
            }
        );
        let all = files(4);
        assert!(plan.chunks(&all).iter().all(|c| c.len() == 1));
    }

    #[test]
    fn modo_archivos_por_job_deja_el_resto_al_ultimo() {
        let plan = SplitPlan::compute(10, Split::FilesPerJob(3)).unwrap();
        assert_eq!(plan.number_of_jobs, 4);
        assert_eq!(plan.overloaded_jobs, -1);

        let lens: Vec<usize> = (0..4).map(|i| plan.chunk_range(i, 10).len()).collect();
        assert_eq!(lens, vec![3, 3, 3, 1]);
    }

    #[test]
    fn modo_archivos_por_job_exacto_deja_un_job_vacio() {
        let plan = SplitPlan::compute(9, Split::FilesPerJob(3)).unwrap();
        assert_eq!(plan.number_of_jobs, 4);
        assert!(plan.chunk_range(3, 9).is_empty());
    }

    #[test]
    fn modo_archivos_por_job_con_pocos_archivos() {
        let plan = SplitPlan::compute(2, Split::FilesPerJob(5)).unwrap();
        assert_eq!(plan.number_of_jobs, 1);
        assert_eq!(plan.chunk_range(0, 2), 0..2);
    }

    #[test]
    fn entradas_degeneradas_son_error() {
        assert!(SplitPlan::compute(0, Split::Jobs(3)).is_err());
        assert!(SplitPlan::compute(5, Split::Jobs(0)).is_err());
        assert!(SplitPlan::compute(5, Split::FilesPerJob(0)).is_err());
    }
}
