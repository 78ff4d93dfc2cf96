//! Run command implementation.

use super::open_store;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::job::JobId;
use crate::orchestrator::Orchestrator;
use crate::store::JobStore;
use anyhow::Result;
use std::sync::Arc;

/// Run a pending job in this process.
pub async fn run_job(job_id: JobId, settings: Settings) -> Result<()> {
    let store = open_store(&settings)?;
    execute(job_id, store, &settings).await
}

/// Drive one job to a terminal state and print the outcome.
pub(super) async fn execute(job_id: JobId, store: Arc<dyn JobStore>, settings: &Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Process) {
        Output::error(&format!("{}", e));
        Output::info("Run 'vidscan doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings, store.clone())?;

    let spinner = Output::spinner(&format!("Processing job #{}...", job_id));
    let outcome = orchestrator.run(job_id).await;
    spinner.finish_and_clear();

    match outcome {
        Ok(()) => {
            let job = store.get(job_id).await?;
            Output::job_result(&job);
            println!();
            Output::success(&format!("Job #{} completed", job_id));
            Ok(())
        }
        Err(e) if e.is_job_failure() => {
            Output::error(&format!("Job #{} failed: {}", job_id, e));
            Err(e.into())
        }
        Err(e) if e.is_infrastructure() => {
            Output::error(&format!("Could not record the outcome of job #{}: {}", job_id, e));
            Output::info("Run 'vidscan sweep' later to reconcile jobs stuck in processing.");
            Err(e.into())
        }
        Err(e) => {
            Output::error(&format!("Could not run job #{}: {}", job_id, e));
            Err(e.into())
        }
    }
}
