//! Job records and their state machine.
//!
//! A job moves `pending -> processing -> {completed | failed}` and never leaves a
//! terminal state. Every mutation goes through a [`JobUpdate`], which the stores
//! validate against the record's current status before applying.

use crate::analysis::Verdict;
use crate::error::{Result, VidscanError};
use crate::media::VideoMetadata;
use crate::transcription::Transcript;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = VidscanError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim()
            .trim_start_matches('#')
            .parse::<i64>()
            .map(JobId)
            .map_err(|_| VidscanError::InvalidInput(format!("Invalid job id: {}", s)))
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// `completed` and `failed` accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `self -> next` is a legal step of the state machine.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = VidscanError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(VidscanError::InvalidInput(format!("Unknown job status: {}", s))),
        }
    }
}

/// Final payload written on `processing -> completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub metadata: VideoMetadata,
    pub transcript: Transcript,
    pub analysis: Verdict,
    /// When the payload was assembled.
    pub processed_at: DateTime<Utc>,
}

/// Durable record tracking one analysis request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub source_reference: String,
    pub title: Option<String>,
    pub status: JobStatus,
    pub result: Option<JobResult>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set on pickup.
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// A fresh pending record.
    pub fn new(id: JobId, source_reference: impl Into<String>) -> Self {
        Self {
            id,
            source_reference: source_reference.into(),
            title: None,
            status: JobStatus::Pending,
            result: None,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Check the result/error/completed_at coupling with `status`.
    pub fn is_consistent(&self) -> bool {
        self.result.is_some() == (self.status == JobStatus::Completed)
            && self.error_message.is_some() == (self.status == JobStatus::Failed)
            && self.completed_at.is_some() == self.status.is_terminal()
    }
}

/// Partial update of a job record.
///
/// Build one with the constructors; they keep the status-coupled fields
/// together so a store never persists a half-terminal record.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub title: Option<String>,
    pub status: Option<JobStatus>,
    pub result: Option<JobResult>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobUpdate {
    /// Record the fetched video title.
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// `pending -> processing`.
    pub fn processing() -> Self {
        Self {
            status: Some(JobStatus::Processing),
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// `processing -> completed` with the final payload.
    pub fn completed(result: JobResult) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            result: Some(result),
            completed_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// `processing -> failed` with a human-readable reason.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error_message: Some(message.into()),
            completed_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Validate against `job` and apply in place.
    ///
    /// Leaves `job` untouched on error.
    pub fn apply_to(self, job: &mut Job) -> Result<()> {
        if let Some(next) = self.status {
            if !job.status.can_transition_to(next) {
                return Err(VidscanError::InvalidTransition {
                    from: job.status,
                    to: next,
                });
            }
            let coupled_ok = match next {
                JobStatus::Completed => {
                    self.result.is_some() && self.error_message.is_none() && self.completed_at.is_some()
                }
                JobStatus::Failed => {
                    self.error_message.is_some() && self.result.is_none() && self.completed_at.is_some()
                }
                _ => {
                    self.result.is_none()
                        && self.error_message.is_none()
                        && self.completed_at.is_none()
                        && self.started_at.is_some()
                }
            };
            if !coupled_ok {
                return Err(VidscanError::Store(format!(
                    "Inconsistent update for job {} entering {}",
                    job.id, next
                )));
            }
        } else if self.result.is_some()
            || self.error_message.is_some()
            || self.started_at.is_some()
            || self.completed_at.is_some()
        {
            return Err(VidscanError::Store(format!(
                "Terminal fields written to job {} without a status change",
                job.id
            )));
        } else if job.status.is_terminal() && self.title.is_some() {
            return Err(VidscanError::InvalidTransition {
                from: job.status,
                to: job.status,
            });
        }

        if let Some(title) = self.title {
            job.title = Some(title);
        }
        if let Some(status) = self.status {
            job.status = status;
        }
        if self.result.is_some() {
            job.result = self.result;
        }
        if self.error_message.is_some() {
            job.error_message = self.error_message;
        }
        if self.started_at.is_some() {
            job.started_at = self.started_at;
        }
        if self.completed_at.is_some() {
            job.completed_at = self.completed_at;
        }
        Ok(())
    }
}

/// Filter for listing jobs.
#[derive(Debug, Clone)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub limit: usize,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            status: None,
            limit: 20,
        }
    }
}

impl JobFilter {
    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Failed));
        assert!(!Processing.can_transition_to(Processing));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Processing));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("Completed".parse::<JobStatus>().unwrap(), JobStatus::Completed);
        assert!("done".parse::<JobStatus>().is_err());
        assert_eq!("#42".parse::<JobId>().unwrap(), JobId(42));
    }

    #[test]
    fn test_failed_update_sets_coupled_fields() {
        let mut job = Job::new(JobId(1), "dQw4w9WgXcQ");
        JobUpdate::processing().apply_to(&mut job).unwrap();
        JobUpdate::failed("boom").apply_to(&mut job).unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("boom"));
        assert!(job.started_at.is_some());
        assert!(job.completed_at.is_some());
        assert!(job.is_consistent());
    }

    #[test]
    fn test_rejected_update_leaves_job_untouched() {
        let mut job = Job::new(JobId(1), "dQw4w9WgXcQ");
        let err = JobUpdate::failed("too early").apply_to(&mut job).unwrap_err();

        assert!(matches!(err, VidscanError::InvalidTransition { .. }));
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.error_message.is_none());
        assert!(job.is_consistent());
    }

    #[test]
    fn test_title_after_terminal_is_rejected() {
        let mut job = Job::new(JobId(1), "dQw4w9WgXcQ");
        JobUpdate::processing().apply_to(&mut job).unwrap();
        JobUpdate::failed("x").apply_to(&mut job).unwrap();
        assert!(JobUpdate::title("late").apply_to(&mut job).is_err());
    }

    #[test]
    fn test_hand_built_terminal_update_is_rejected() {
        let mut job = Job::new(JobId(1), "dQw4w9WgXcQ");
        JobUpdate::processing().apply_to(&mut job).unwrap();
        let bad = JobUpdate {
            status: Some(JobStatus::Failed),
            ..Default::default()
        };
        assert!(bad.apply_to(&mut job).is_err());
        assert_eq!(job.status, JobStatus::Processing);
    }
}
