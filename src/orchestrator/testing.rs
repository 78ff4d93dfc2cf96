//! Scripted capability fakes shared by the pipeline, dispatch and service tests.
//!
//! The fakes write real files into the scratch directory so artifact cleanup
//! can be observed on disk.

use super::{Capabilities, Orchestrator};
use crate::analysis::{ContentAnalyzer, Verdict};
use crate::audio::AudioTranscoder;
use crate::config::Settings;
use crate::error::{Result, VidscanError};
use crate::job::{Job, JobFilter, JobId, JobStatus, JobUpdate};
use crate::media::{MediaFetcher, VideoMetadata};
use crate::store::{JobStore, MemoryJobStore};
use crate::transcription::{Transcriber, Transcript, TranscriptSegment};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Which fake capability misbehaves, and how.
#[derive(Debug, Clone, Copy, Default)]
pub struct Script {
    pub fail_metadata: bool,
    pub fail_audio: bool,
    pub fail_transcode: bool,
    pub fail_transcribe: bool,
    pub hang_transcribe: bool,
    pub fail_analyze: bool,
    pub duration: Option<u32>,
}

pub struct FakeFetcher {
    script: Script,
    pub audio_calls: AtomicUsize,
}

#[async_trait]
impl MediaFetcher for FakeFetcher {
    async fn fetch_metadata(&self, reference: &str) -> Result<VideoMetadata> {
        if self.script.fail_metadata {
            return Err(VidscanError::Fetch("Video unavailable".to_string()));
        }
        Ok(VideoMetadata {
            id: reference.to_string(),
            title: "Never Gonna Give You Up".to_string(),
            duration_seconds: self.script.duration.or(Some(212)),
            uploader: Some("Rick Astley".to_string()),
            ..Default::default()
        })
    }

    async fn fetch_audio(&self, reference: &str, output_dir: &Path) -> Result<PathBuf> {
        self.audio_calls.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_audio {
            // A half-written download left behind by the failing tool
            std::fs::write(output_dir.join(format!("{}.mp3.part", reference)), b"partial")?;
            return Err(VidscanError::Fetch("HTTP Error 403: Forbidden".to_string()));
        }
        let path = output_dir.join(format!("{}.mp3", reference));
        std::fs::write(&path, b"mp3")?;
        Ok(path)
    }
}

pub struct FakeTranscoder {
    script: Script,
}

#[async_trait]
impl AudioTranscoder for FakeTranscoder {
    async fn transcode(&self, source: &Path, sample_rate: u32, channels: u16) -> Result<PathBuf> {
        assert_eq!((sample_rate, channels), (16000, 1));
        if self.script.fail_transcode {
            return Err(std::io::Error::other("ffmpeg exited with status 1").into());
        }
        let path = source.with_extension("wav");
        std::fs::write(&path, b"RIFF")?;
        Ok(path)
    }
}

#[derive(Default)]
pub struct FakeTranscriber {
    script: Script,
    pub loaded: AtomicBool,
    pub releases: AtomicUsize,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio_path: &Path, _language: Option<&str>) -> Result<Transcript> {
        assert!(audio_path.exists());
        self.loaded.store(true, Ordering::SeqCst);
        if self.script.hang_transcribe {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if self.script.fail_transcribe {
            return Err(VidscanError::Transcription("Unsupported audio".to_string()));
        }
        Ok(Transcript::new(
            vec![
                TranscriptSegment::new(0.0, 2.0, "We're no strangers".to_string()),
                TranscriptSegment::new(2.0, 4.0, "to love".to_string()),
            ],
            "en".to_string(),
        ))
    }

    fn release(&self) {
        self.loaded.store(false, Ordering::SeqCst);
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeAnalyzer {
    script: Script,
    transcriber: Arc<FakeTranscriber>,
    pub saw_loaded_session: AtomicBool,
}

#[async_trait]
impl ContentAnalyzer for FakeAnalyzer {
    async fn analyze(&self, transcript: &str, _metadata: &VideoMetadata) -> Result<Verdict> {
        self.saw_loaded_session
            .store(self.transcriber.loaded.load(Ordering::SeqCst), Ordering::SeqCst);
        if self.script.fail_analyze {
            return Err(VidscanError::Analysis("Model refused".to_string()));
        }
        assert!(transcript.contains("strangers"));
        Ok(Verdict {
            ai_generated_score: 7,
            dangerous_content: false,
            danger_categories: Vec::new(),
            danger_severity: None,
            explanation: None,
        })
    }
}

/// Store wrapper that records successful writes and can fail title or
/// terminal ones.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryJobStore,
    pub title_failures: AtomicU32,
    pub terminal_failures: AtomicU32,
    pub writes: Mutex<Vec<Option<JobStatus>>>,
}

#[async_trait]
impl JobStore for FlakyStore {
    async fn create(&self, source_reference: &str) -> Result<JobId> {
        self.inner.create(source_reference).await
    }

    async fn get(&self, id: JobId) -> Result<Job> {
        self.inner.get(id).await
    }

    async fn update(&self, id: JobId, update: JobUpdate) -> Result<()> {
        let budget = match update.status {
            Some(status) if status.is_terminal() => Some(&self.terminal_failures),
            None if update.title.is_some() => Some(&self.title_failures),
            _ => None,
        };
        if budget.is_some_and(|b| {
            b.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }) {
            return Err(VidscanError::Store("database is locked".to_string()));
        }
        let status = update.status;
        self.inner.update(id, update).await?;
        self.writes.lock().unwrap().push(status);
        Ok(())
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        self.inner.list(filter).await
    }
}

/// An orchestrator wired to fakes, plus handles to inspect them.
pub struct Harness {
    pub store: Arc<FlakyStore>,
    pub fetcher: Arc<FakeFetcher>,
    pub transcriber: Arc<FakeTranscriber>,
    pub analyzer: Arc<FakeAnalyzer>,
    pub settings: Settings,
    pub orchestrator: Orchestrator,
    pub temp: TempDir,
}

impl Harness {
    pub fn new(script: Script) -> Self {
        Self::build(script, None)
    }

    /// Like [`Harness::new`], but fetching through `fetcher`.
    pub fn with_fetcher(script: Script, fetcher: Arc<dyn MediaFetcher>) -> Self {
        Self::build(script, Some(fetcher))
    }

    fn build(script: Script, real_fetcher: Option<Arc<dyn MediaFetcher>>) -> Self {
        let temp = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.general.temp_dir = temp.path().to_string_lossy().into_owned();
        settings.pipeline.terminal_write_backoff_ms = 1;

        let store = Arc::new(FlakyStore::default());
        let fetcher = Arc::new(FakeFetcher {
            script,
            audio_calls: AtomicUsize::new(0),
        });
        let transcriber = Arc::new(FakeTranscriber {
            script,
            ..Default::default()
        });
        let analyzer = Arc::new(FakeAnalyzer {
            script,
            transcriber: transcriber.clone(),
            saw_loaded_session: AtomicBool::new(false),
        });

        let shared = transcriber.clone();
        let capabilities = Capabilities {
            fetcher: real_fetcher.unwrap_or_else(|| fetcher.clone() as Arc<dyn MediaFetcher>),
            transcoder: Arc::new(FakeTranscoder { script }),
            transcriber: Arc::new(move || shared.clone() as Arc<dyn Transcriber>),
            analyzer: analyzer.clone(),
        };

        let orchestrator =
            Orchestrator::with_components(&settings, store.clone(), capabilities).unwrap();

        Self {
            store,
            fetcher,
            transcriber,
            analyzer,
            settings,
            orchestrator,
            temp,
        }
    }

    pub async fn submit(&self) -> JobId {
        self.store.create("dQw4w9WgXcQ").await.unwrap()
    }

    pub async fn job(&self, id: JobId) -> Job {
        self.store.get(id).await.unwrap()
    }

    /// Entries left under the scratch root.
    pub fn leftover_files(&self) -> usize {
        std::fs::read_dir(self.temp.path()).unwrap().count()
    }
}
