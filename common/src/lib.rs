pub mod catalog;
pub mod config;
pub mod error;
pub mod job;
pub mod partition;
pub mod proxy;
pub mod queue;
pub mod results;
pub mod shell;
pub mod storage;
pub mod task;
pub mod template;

pub use catalog::{Catalog, DbsCatalog, FileList, FileListResolver, FileListSource};
pub use config::{RunConfig, SiteSettings};
pub use error::{Result, RunError};
pub use job::{Job, JobId, JobSet, JobState};
pub use partition::SplitPlan;
pub use proxy::{ProxyStatus, ProxyTool, VomsProxy};
pub use queue::{BatchQueue, SgeQueue, SubmitRequest};
pub use results::TaskReport;
pub use storage::{Merger, RemoteEntry, RemoteStorage, RootTools, SrmStorage};
pub use task::{Split, Task};
pub use template::{ConfigTemplate, Placeholder, Substitutions};
