//! Jobs command implementation.

use super::open_store;
use crate::cli::Output;
use crate::config::Settings;
use crate::job::JobStatus;
use crate::service::JobService;
use anyhow::Result;

/// List recent jobs.
pub async fn run_jobs(limit: usize, status: Option<JobStatus>, settings: Settings) -> Result<()> {
    let service = JobService::new(open_store(&settings)?);
    let jobs = service.list(Some(limit), status).await?;

    if jobs.is_empty() {
        Output::info("No jobs yet. Use 'vidscan submit <url>' to add one.");
        return Ok(());
    }

    Output::header(&format!("Jobs ({})", jobs.len()));
    println!();
    for job in &jobs {
        Output::job_line(job);
    }

    Ok(())
}
