//! In-memory job store implementation.
//!
//! Useful for testing and single-process runs.

use super::JobStore;
use crate::error::{Result, VidscanError};
use crate::job::{Job, JobFilter, JobId, JobUpdate};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// In-memory job store.
pub struct MemoryJobStore {
    jobs: RwLock<BTreeMap<JobId, Job>>,
}

impl MemoryJobStore {
    /// Create a new in-memory job store.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(BTreeMap::new()),
        }
    }

    fn poisoned<E: std::fmt::Display>(e: E) -> VidscanError {
        VidscanError::Store(format!("Failed to acquire lock: {}", e))
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, source_reference: &str) -> Result<JobId> {
        let mut jobs = self.jobs.write().map_err(Self::poisoned)?;
        let id = JobId(jobs.keys().next_back().map(|k| k.0 + 1).unwrap_or(1));
        jobs.insert(id, Job::new(id, source_reference));
        Ok(id)
    }

    async fn get(&self, id: JobId) -> Result<Job> {
        let jobs = self.jobs.read().map_err(Self::poisoned)?;
        jobs.get(&id).cloned().ok_or(VidscanError::NotFound(id))
    }

    async fn update(&self, id: JobId, update: JobUpdate) -> Result<()> {
        let mut jobs = self.jobs.write().map_err(Self::poisoned)?;
        let job = jobs.get_mut(&id).ok_or(VidscanError::NotFound(id))?;
        update.apply_to(job)
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let jobs = self.jobs.read().map_err(Self::poisoned)?;
        let mut result: Vec<Job> = jobs
            .values()
            .filter(|j| filter.status.map_or(true, |s| j.status == s))
            .cloned()
            .collect();

        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        result.truncate(filter.limit);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;

    #[tokio::test]
    async fn test_memory_job_store() {
        let store = MemoryJobStore::new();

        let first = store.create("https://youtu.be/dQw4w9WgXcQ").await.unwrap();
        let second = store.create("jNQXAC9IVRw").await.unwrap();
        assert_ne!(first, second);

        let job = store.get(first).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.source_reference, "https://youtu.be/dQw4w9WgXcQ");

        store.update(second, JobUpdate::processing()).await.unwrap();

        let all = store.list(&JobFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second);

        let processing = store
            .list(&JobFilter::default().with_status(JobStatus::Processing))
            .await
            .unwrap();
        assert_eq!(processing.len(), 1);
        assert_eq!(processing[0].id, second);
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let store = MemoryJobStore::new();
        assert!(matches!(store.get(JobId(9)).await, Err(VidscanError::NotFound(JobId(9)))));
        assert!(matches!(
            store.update(JobId(9), JobUpdate::processing()).await,
            Err(VidscanError::NotFound(_))
        ));
        assert!(store.list(&JobFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_pickup_rejected() {
        let store = MemoryJobStore::new();
        let id = store.create("dQw4w9WgXcQ").await.unwrap();

        store.update(id, JobUpdate::processing()).await.unwrap();
        let err = store.update(id, JobUpdate::processing()).await.unwrap_err();
        assert!(matches!(err, VidscanError::InvalidTransition { .. }));
    }
}
