//! Status and result command implementations.

use super::open_store;
use crate::cli::Output;
use crate::config::Settings;
use crate::job::JobId;
use crate::service::{JobService, ResultView};
use anyhow::Result;

/// Show the status of a job.
pub async fn run_status(job_id: JobId, settings: Settings) -> Result<()> {
    let service = JobService::new(open_store(&settings)?);
    let summary = service.status(job_id).await?;
    Output::job_status(&summary);
    Ok(())
}

/// Show the result of a job, or say it is not ready.
pub async fn run_result(job_id: JobId, json: bool, settings: Settings) -> Result<()> {
    let service = JobService::new(open_store(&settings)?);

    match service.result(job_id).await? {
        ResultView::NotReady(status) => {
            Output::warning(&format!(
                "Job #{} is still {}. Please check back later.",
                job_id, status
            ));
        }
        ResultView::Ready(job) if json => {
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        ResultView::Ready(job) => {
            Output::job_result(&job);
        }
    }

    Ok(())
}
