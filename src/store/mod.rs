//! Job store abstraction for vidscan.
//!
//! Provides a trait-based interface over durable job storage. Both backends
//! validate every [`JobUpdate`] against the stored status under a single lock,
//! so a transition is either applied whole or rejected without mutation.

mod memory;
mod sqlite;

pub use memory::MemoryJobStore;
pub use sqlite::SqliteJobStore;

use crate::error::Result;
use crate::job::{Job, JobFilter, JobId, JobUpdate};
use async_trait::async_trait;

/// Durable keyed storage for job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a pending job for a source reference.
    async fn create(&self, source_reference: &str) -> Result<JobId>;

    /// Fetch a job by ID. Fails with `NotFound` if it does not exist.
    async fn get(&self, id: JobId) -> Result<Job>;

    /// Apply a partial update. Fails with `NotFound` or `InvalidTransition`.
    async fn update(&self, id: JobId, update: JobUpdate) -> Result<()>;

    /// List jobs, newest first.
    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>>;
}
