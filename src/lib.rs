//! vidscan - Video content screening
//!
//! Takes a video reference, fetches its audio, transcribes it, and asks a
//! language model whether the content looks AI-generated or harmful. Every
//! submission is tracked as a job in a local database.
//!
//! # Overview
//!
//! vidscan allows you to:
//! - Submit YouTube videos for analysis and poll their jobs
//! - Run jobs from the command line or through an HTTP API
//! - Keep a history of verdicts, transcripts and failures
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `job` - Job records and their state machine
//! - `store` - Job persistence (SQLite, in-memory)
//! - `media` - Video metadata and audio fetching
//! - `audio` - Audio transcoding
//! - `transcription` - Speech-to-text transcription
//! - `analysis` - Transcript classification
//! - `orchestrator` - Runs one job through every stage
//! - `dispatch` - Bounded background worker pool
//! - `service` - Submit, status, result and list operations
//! - `config` - Configuration management
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vidscan::config::Settings;
//! use vidscan::orchestrator::Orchestrator;
//! use vidscan::service::JobService;
//! use vidscan::store::SqliteJobStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let store = Arc::new(SqliteJobStore::new(&settings.sqlite_path())?);
//!
//!     let service = JobService::new(store.clone());
//!     let job_id = service.submit("https://youtu.be/dQw4w9WgXcQ").await?;
//!
//!     Orchestrator::new(&settings, store)?.run(job_id).await?;
//!     println!("{:?}", service.result(job_id).await?);
//!
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod audio;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod job;
pub mod media;
pub mod openai;
pub mod orchestrator;
pub mod service;
pub mod store;
pub mod transcription;

pub use error::{Result, VidscanError};
