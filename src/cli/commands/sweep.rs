//! Sweep command implementation.

use super::open_store;
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use chrono::Utc;

/// Fail jobs abandoned in `processing`.
pub async fn run_sweep(settings: Settings) -> Result<()> {
    let store = open_store(&settings)?;
    let orchestrator = Orchestrator::new(&settings, store)?;

    let swept = orchestrator.sweep_stale(Utc::now()).await?;

    if swept.is_empty() {
        Output::success("No stale jobs found.");
    } else {
        Output::warning(&format!(
            "Marked {} job(s) stuck in processing for over {}s as failed:",
            swept.len(),
            settings.pipeline.stale_after_seconds
        ));
        for id in swept {
            Output::list_item(&format!("#{}", id));
        }
    }

    Ok(())
}
