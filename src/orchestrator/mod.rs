//! Pipeline orchestrator for vidscan.
//!
//! Drives one job through fetch, transcode, transcribe and analyze while keeping
//! the job record in step: `processing` is written before any stage runs, the
//! title as soon as metadata arrives, and exactly one terminal write after the
//! first failure or the assembled result. Intermediate files live in a
//! [`Scratch`] directory that is removed on every exit path.

mod scratch;
#[cfg(test)]
pub(crate) mod testing;

pub use scratch::Scratch;

use crate::analysis::{ContentAnalyzer, LlmAnalyzer};
use crate::audio::{AudioTranscoder, FfmpegTranscoder};
use crate::config::{PipelineSettings, Prompts, Settings};
use crate::error::{Result, VidscanError};
use crate::job::{Job, JobFilter, JobId, JobResult, JobStatus, JobUpdate};
use crate::media::{MediaFetcher, YtDlpFetcher};
use crate::store::JobStore;
use crate::transcription::{Transcriber, WhisperTranscriber};
use chrono::{DateTime, TimeDelta, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Builds a fresh transcriber per execution so no session outlives its job.
pub type TranscriberFactory = Arc<dyn Fn() -> Arc<dyn Transcriber> + Send + Sync>;

/// The capability providers a pipeline run calls into.
#[derive(Clone)]
pub struct Capabilities {
    pub fetcher: Arc<dyn MediaFetcher>,
    pub transcoder: Arc<dyn AudioTranscoder>,
    pub transcriber: TranscriberFactory,
    pub analyzer: Arc<dyn ContentAnalyzer>,
}

impl Capabilities {
    /// yt-dlp, ffmpeg, Whisper and the chat analyzer, configured from `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.analysis.prompts_dir.as_deref(),
            Some(&settings.analysis.variables),
        )?;

        info!(
            "Using {} transcription ({}) and {} analysis ({})",
            settings.transcription.provider,
            settings.transcription.model,
            settings.analysis.provider,
            settings.analysis.model
        );

        let transcription = settings.transcription.clone();
        Ok(Self {
            fetcher: Arc::new(YtDlpFetcher::new(&settings.fetch)),
            transcoder: Arc::new(FfmpegTranscoder::new()),
            transcriber: Arc::new(move || {
                Arc::new(WhisperTranscriber::with_config(&transcription)) as Arc<dyn Transcriber>
            }),
            analyzer: Arc::new(LlmAnalyzer::new(&settings.analysis, prompts)),
        })
    }
}

/// One ordered step of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchMetadata,
    FetchAudio,
    Transcode,
    Transcribe,
    Analyze,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::FetchMetadata => "fetch metadata",
            Stage::FetchAudio => "fetch audio",
            Stage::Transcode => "transcode",
            Stage::Transcribe => "transcribe",
            Stage::Analyze => "analyze",
        }
    }

    /// Attribute an error raised inside this stage to the stage's kind.
    ///
    /// Errors that already carry a job-failure kind pass through unchanged.
    fn tag(self, err: VidscanError) -> VidscanError {
        if err.is_job_failure() {
            return err;
        }
        let message = err.to_string();
        match self {
            Stage::FetchMetadata | Stage::FetchAudio => VidscanError::Fetch(message),
            Stage::Transcode => VidscanError::Transcode(message),
            Stage::Transcribe => VidscanError::Transcription(message),
            Stage::Analyze => VidscanError::Analysis(message),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The main orchestrator for the vidscan pipeline.
pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    capabilities: Capabilities,
    pipeline: PipelineSettings,
    max_duration_seconds: u32,
    temp_dir: PathBuf,
    timeout: Duration,
}

impl Orchestrator {
    /// Create an orchestrator with the default capability providers.
    pub fn new(settings: &Settings, store: Arc<dyn JobStore>) -> Result<Self> {
        let capabilities = Capabilities::from_settings(settings)?;
        Self::with_components(settings, store, capabilities)
    }

    /// Create an orchestrator with custom capability providers.
    pub fn with_components(
        settings: &Settings,
        store: Arc<dyn JobStore>,
        capabilities: Capabilities,
    ) -> Result<Self> {
        let temp_dir = settings.temp_dir();
        std::fs::create_dir_all(&temp_dir)?;

        Ok(Self {
            store,
            capabilities,
            pipeline: settings.pipeline.clone(),
            max_duration_seconds: settings.fetch.max_duration_seconds,
            temp_dir,
            timeout: settings.pipeline.timeout(),
        })
    }

    /// Override the wall-clock ceiling.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> Arc<dyn JobStore> {
        self.store.clone()
    }

    /// Execute the pipeline for one job.
    ///
    /// Every outcome is written to the store. A job-level failure is persisted
    /// as `failed` and then returned; a store failure on the terminal write is
    /// returned as a `Store` error and leaves the job in `processing`.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn run(&self, job_id: JobId) -> Result<()> {
        let job = self.store.get(job_id).await?;
        self.store.update(job_id, JobUpdate::processing()).await?;
        info!("Processing job {} ({})", job_id, job.source_reference);

        let mut scratch = Scratch::new(&self.temp_dir, job_id);
        debug!("Scratch directory {}", scratch.dir().display());
        let transcriber = (self.capabilities.transcriber)();
        let mut stage = Stage::FetchMetadata;

        let outcome = match tokio::time::timeout(
            self.timeout,
            self.run_stages(&job, &mut scratch, &mut stage, transcriber.as_ref()),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(VidscanError::Timeout {
                limit: self.timeout,
            }),
        };

        // A timeout or failure may have interrupted transcription mid-flight
        transcriber.release();

        let (update, failure) = match outcome {
            Ok(result) => (JobUpdate::completed(result), None),
            // Stage errors are all job failures; anything else is a mid-run
            // store write, and the record is left for the sweep.
            Err(e) if !e.is_job_failure() => {
                error!(
                    "Store write for job {} failed during {}, job stuck in processing: {}",
                    job_id, stage, e
                );
                scratch.cleanup();
                return Err(e);
            }
            Err(e) => {
                warn!("Job {} failed during {}: {}", job_id, stage, e);
                (JobUpdate::failed(format!("{}: {}", stage, e)), Some(e))
            }
        };

        let written = self.write_terminal(job_id, update).await;
        scratch.cleanup();

        match (written, failure) {
            (Err(store_err), _) => Err(store_err),
            (Ok(()), Some(e)) => Err(e),
            (Ok(()), None) => {
                info!("Job {} completed", job_id);
                Ok(())
            }
        }
    }

    /// The seven pipeline steps. `stage` tracks the step in progress so a
    /// timeout can be attributed.
    async fn run_stages(
        &self,
        job: &Job,
        scratch: &mut Scratch,
        stage: &mut Stage,
        transcriber: &dyn Transcriber,
    ) -> Result<JobResult> {
        let reference = job.source_reference.as_str();

        *stage = Stage::FetchMetadata;
        info!("Fetching metadata");
        let metadata = self
            .capabilities
            .fetcher
            .fetch_metadata(reference)
            .await
            .map_err(|e| Stage::FetchMetadata.tag(e))?;
        self.store
            .update(job.id, JobUpdate::title(metadata.title.as_str()))
            .await?;
        info!("Title: {}", metadata.title);

        if let Some(duration) = metadata.duration_seconds {
            if duration > self.max_duration_seconds {
                return Err(VidscanError::Fetch(format!(
                    "Video duration ({} seconds) exceeds maximum ({} seconds)",
                    duration, self.max_duration_seconds
                )));
            }
        }

        *stage = Stage::FetchAudio;
        info!("Downloading audio");
        let dir = scratch
            .create()
            .map_err(|e| Stage::FetchAudio.tag(e.into()))?
            .to_path_buf();
        let audio = self
            .capabilities
            .fetcher
            .fetch_audio(reference, &dir)
            .await
            .map_err(|e| Stage::FetchAudio.tag(e))?;
        scratch.track(&audio);

        *stage = Stage::Transcode;
        debug!(
            "Transcoding to {} Hz, {} channel(s)",
            self.pipeline.sample_rate, self.pipeline.channels
        );
        let normalized = self
            .capabilities
            .transcoder
            .transcode(&audio, self.pipeline.sample_rate, self.pipeline.channels)
            .await
            .map_err(|e| Stage::Transcode.tag(e))?;
        scratch.track(&normalized);

        *stage = Stage::Transcribe;
        info!("Transcribing");
        let transcript = transcriber
            .transcribe(&normalized, self.pipeline.language_hint.as_deref())
            .await
            .map_err(|e| Stage::Transcribe.tag(e))?;
        info!(
            "Transcription complete ({} segments, language {})",
            transcript.segments.len(),
            transcript.language
        );

        // The analyzer must not compete with the transcription session
        transcriber.release();

        *stage = Stage::Analyze;
        info!("Analyzing transcript");
        let analysis = self
            .capabilities
            .analyzer
            .analyze(&transcript.text, &metadata)
            .await
            .map_err(|e| Stage::Analyze.tag(e))?;

        Ok(JobResult {
            metadata,
            transcript,
            analysis,
            processed_at: Utc::now(),
        })
    }

    /// Persist the terminal update, retrying store faults with linear backoff.
    async fn write_terminal(&self, job_id: JobId, update: JobUpdate) -> Result<()> {
        let attempts = self.pipeline.terminal_write_attempts.max(1);
        let target = update.status;
        let mut attempt = 1;

        loop {
            match self.store.update(job_id, update.clone()).await {
                Ok(()) => return Ok(()),
                // An earlier attempt landed even though it reported an error
                Err(VidscanError::InvalidTransition { from, .. })
                    if attempt > 1 && Some(from) == target =>
                {
                    return Ok(());
                }
                Err(e) if e.is_infrastructure() && attempt < attempts => {
                    warn!(
                        "Terminal write for job {} failed (attempt {}/{}): {}",
                        job_id, attempt, attempts, e
                    );
                    let backoff = self.pipeline.terminal_write_backoff_ms * u64::from(attempt);
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                    attempt += 1;
                }
                Err(e) if e.is_infrastructure() => {
                    error!(
                        "Terminal write for job {} failed after {} attempt(s), job stuck in processing: {}",
                        job_id, attempt, e
                    );
                    return Err(e);
                }
                Err(e) => {
                    error!("Terminal write for job {} rejected: {}", job_id, e);
                    return Err(e);
                }
            }
        }
    }

    /// Fail every `processing` job picked up more than `stale_after_seconds`
    /// before `now`. Returns the ids that were swept.
    #[instrument(skip(self))]
    pub async fn sweep_stale(&self, now: DateTime<Utc>) -> Result<Vec<JobId>> {
        let stale_after = i64::try_from(self.pipeline.stale_after_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);

        let processing = self
            .store
            .list(
                &JobFilter::default()
                    .with_status(JobStatus::Processing)
                    .with_limit(usize::MAX),
            )
            .await?;

        let mut swept = Vec::new();
        for job in processing {
            let since = job.started_at.unwrap_or(job.created_at);
            let age = now - since;
            if age <= stale_after {
                continue;
            }

            let message = format!(
                "Abandoned after {}s in processing without a recorded outcome",
                age.num_seconds()
            );
            match self.store.update(job.id, JobUpdate::failed(message)).await {
                Ok(()) => {
                    warn!("Marked stale job {} as failed", job.id);
                    swept.push(job.id);
                }
                Err(VidscanError::InvalidTransition { .. }) => {
                    debug!("Job {} finished before it could be swept", job.id);
                }
                Err(e) => return Err(e),
            }
        }

        if !swept.is_empty() {
            info!("Swept {} stale job(s)", swept.len());
        }
        Ok(swept)
    }
}
