//! CLI command implementations.

mod config;
mod doctor;
mod jobs;
mod run;
mod serve;
mod status;
mod submit;
mod sweep;

pub use config::run_config;
pub use doctor::run_doctor;
pub use jobs::run_jobs;
pub use run::run_job;
pub use serve::run_serve;
pub use status::{run_result, run_status};
pub use submit::run_submit;
pub use sweep::run_sweep;

use crate::config::Settings;
use crate::store::{JobStore, SqliteJobStore};
use std::sync::Arc;

/// Open the configured job database.
fn open_store(settings: &Settings) -> crate::error::Result<Arc<dyn JobStore>> {
    Ok(Arc::new(SqliteJobStore::new(&settings.sqlite_path())?))
}
