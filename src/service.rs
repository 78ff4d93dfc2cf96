//! Caller-facing job operations shared by the CLI and the HTTP API.

use crate::dispatch::Dispatcher;
use crate::error::{Result, VidscanError};
use crate::job::{Job, JobFilter, JobId, JobStatus};
use crate::media::extract_video_id;
use crate::store::JobStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use url::Url;

/// Summary of a job without its result payload.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub job_id: JobId,
    pub source_reference: String,
    pub title: Option<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            source_reference: job.source_reference.clone(),
            title: job.title.clone(),
            status: job.status,
            created_at: job.created_at,
            completed_at: job.completed_at,
            error_message: job.error_message.clone(),
        }
    }
}

/// Answer to a result request.
#[derive(Debug, Clone)]
pub enum ResultView {
    /// The job has not reached a terminal state yet.
    NotReady(JobStatus),
    /// The terminal record, carrying either a result or an error message.
    Ready(Box<Job>),
}

/// Check that `input` names a video we can fetch, and return it trimmed.
///
/// Accepts `http(s)` video URLs (with or without scheme) and bare video IDs.
pub fn validate_reference(input: &str) -> Result<String> {
    let reference = input.trim();
    if reference.is_empty() {
        return Err(VidscanError::InvalidInput("Empty video reference".to_string()));
    }

    if reference.contains("://") {
        let url = Url::parse(reference)
            .map_err(|e| VidscanError::InvalidInput(format!("Invalid URL '{}': {}", reference, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(VidscanError::InvalidInput(format!(
                "Unsupported URL scheme: {}",
                url.scheme()
            )));
        }
    }

    if extract_video_id(reference).is_none() {
        return Err(VidscanError::InvalidInput(format!(
            "Not a recognizable video URL or ID: {}",
            reference
        )));
    }

    Ok(reference.to_string())
}

/// Submit, inspect and list jobs.
pub struct JobService {
    store: Arc<dyn JobStore>,
    dispatcher: Option<Arc<Dispatcher>>,
}

impl JobService {
    /// A service that only records jobs; something else must run them.
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            dispatcher: None,
        }
    }

    /// Hand every submitted job to `dispatcher`.
    pub fn with_dispatcher(mut self, dispatcher: Arc<Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn store(&self) -> Arc<dyn JobStore> {
        self.store.clone()
    }

    /// Validate a reference, create a pending job and dispatch it.
    #[instrument(skip(self))]
    pub async fn submit(&self, reference: &str) -> Result<JobId> {
        let reference = validate_reference(reference)?;
        let job_id = self.store.create(&reference).await?;
        info!("Submitted job {} for {}", job_id, reference);

        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.dispatch(job_id).await?;
        }
        Ok(job_id)
    }

    pub async fn status(&self, job_id: JobId) -> Result<JobSummary> {
        let job = self.store.get(job_id).await?;
        Ok(JobSummary::from(&job))
    }

    /// The full record once terminal, otherwise the current status.
    pub async fn result(&self, job_id: JobId) -> Result<ResultView> {
        let job = self.store.get(job_id).await?;
        if job.status.is_terminal() {
            Ok(ResultView::Ready(Box::new(job)))
        } else {
            Ok(ResultView::NotReady(job.status))
        }
    }

    /// Most recent jobs first.
    pub async fn list(&self, limit: Option<usize>, status: Option<JobStatus>) -> Result<Vec<JobSummary>> {
        let mut filter = JobFilter::default();
        if let Some(limit) = limit {
            filter = filter.with_limit(limit);
        }
        if let Some(status) = status {
            filter = filter.with_status(status);
        }

        let jobs = self.store.list(&filter).await?;
        Ok(jobs.iter().map(JobSummary::from).collect())
    }

    /// Dispatch every job still `pending`, oldest first. Returns how many were queued.
    pub async fn requeue_pending(&self) -> Result<usize> {
        let Some(dispatcher) = &self.dispatcher else {
            return Ok(0);
        };

        let mut pending = self
            .store
            .list(
                &JobFilter::default()
                    .with_status(JobStatus::Pending)
                    .with_limit(usize::MAX),
            )
            .await?;
        pending.reverse();

        let mut queued = 0;
        for job in pending {
            match dispatcher.dispatch(job.id).await {
                Ok(true) => queued += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!("Could not requeue job {}: {}", job.id, e);
                    return Err(e);
                }
            }
        }

        if queued > 0 {
            info!("Requeued {} pending job(s)", queued);
        }
        Ok(queued)
    }
}
