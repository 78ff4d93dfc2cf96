//! Submit command implementation.

use super::{open_store, run::execute};
use crate::cli::Output;
use crate::config::Settings;
use crate::service::JobService;
use anyhow::Result;

/// Submit a video, optionally running it to completion here.
pub async fn run_submit(reference: &str, wait: bool, settings: Settings) -> Result<()> {
    let store = open_store(&settings)?;
    let service = JobService::new(store.clone());

    let job_id = match service.submit(reference).await {
        Ok(id) => id,
        Err(e) => {
            Output::error(&format!("{}", e));
            return Err(e.into());
        }
    };

    Output::success(&format!("Submitted job #{}", job_id));

    if wait {
        return execute(job_id, store, &settings).await;
    }

    Output::info(&format!(
        "Run it with 'vidscan run {}', or start 'vidscan serve' to process pending jobs.",
        job_id
    ));
    Ok(())
}
