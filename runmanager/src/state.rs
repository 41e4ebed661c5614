// runmanager/src/state.rs

use common::{
    shell, BatchQueue, Catalog, DbsCatalog, Merger, RemoteStorage, RootTools, RunConfig,
    SgeQueue, SiteSettings, SrmStorage,
};
use std::sync::Arc;

/// Flags de la línea de comandos que cambian el comportamiento de la corrida.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    pub verbose: bool,
    pub renew: bool,
    pub merge_only: bool,
}

/// Todo lo que necesita una fase de la corrida. Se clona barato (Arcs) para
/// pasarlo a cada tarea del pool.
#[derive(Clone)]
pub struct RunContext {
    pub config: Arc<RunConfig>,
    pub settings: Arc<SiteSettings>,
    pub options: RunOptions,

    // herramientas externas
    pub catalog: Arc<dyn Catalog>,
    pub queue: Arc<dyn BatchQueue>,
    pub storage: Arc<dyn RemoteStorage>,
    pub merger: Arc<dyn Merger>,
}

impl RunContext {
    /// Contexto con las herramientas reales del sitio.
    pub fn for_site(config: RunConfig, settings: SiteSettings, options: RunOptions) -> Self {
        let queue_user = queue_user(&settings);

        let catalog = DbsCatalog::new(settings.dbs_url.clone());
        let queue = SgeQueue::new(settings.queue.clone(), queue_user);
        let storage = SrmStorage {
            endpoint: settings.srm_endpoint.clone(),
            storage_root: settings.storage_root.clone(),
            dcap_prefix: settings.dcap_prefix.clone(),
            user: config.hp_name.clone(),
        };
        let merger = RootTools {
            dedup_tool: settings.dedup_tool.clone(),
        };

        Self {
            config: Arc::new(config),
            settings: Arc::new(settings),
            options,
            catalog: Arc::new(catalog),
            queue: Arc::new(queue),
            storage: Arc::new(storage),
            merger: Arc::new(merger),
        }
    }
}

/// Usuario para `qstat -u`: $USER, o `whoami` si no está.
fn queue_user(settings: &SiteSettings) -> String {
    if let Some(user) = &settings.user {
        return user.clone();
    }
    shell::run("whoami", &[])
        .ok()
        .filter(|out| out.success())
        .map(|out| out.stdout.trim().to_string())
        .unwrap_or_default()
}
