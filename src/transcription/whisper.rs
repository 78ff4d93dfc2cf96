//! OpenAI Whisper transcription implementation.

use super::{Transcriber, Transcript, TranscriptSegment};
use crate::audio::split_audio;
use crate::config::TranscriptionSettings;
use crate::error::{Result, VidscanError};
use crate::openai::create_client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{AudioInput, AudioResponseFormat, CreateTranscriptionRequestArgs};
use async_openai::Client;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info, instrument};

/// OpenAI Whisper-based transcriber.
///
/// The API session is created on the first transcription and dropped by
/// [`Transcriber::release`].
pub struct WhisperTranscriber {
    session: Mutex<Option<Client<OpenAIConfig>>>,
    model: String,
    chunk_duration_seconds: u32,
    max_concurrent_chunks: usize,
    request_timeout: Duration,
}

impl WhisperTranscriber {
    /// Create a new Whisper transcriber with custom configuration.
    pub fn with_config(settings: &TranscriptionSettings) -> Self {
        Self {
            session: Mutex::new(None),
            model: settings.model.clone(),
            chunk_duration_seconds: settings.chunk_duration_seconds,
            max_concurrent_chunks: settings.max_concurrent_chunks.max(1),
            request_timeout: Duration::from_secs(settings.request_timeout_seconds),
        }
    }

    /// Whether a session is currently held.
    pub fn is_loaded(&self) -> bool {
        self.session.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    fn session(&self) -> Result<Client<OpenAIConfig>> {
        let mut guard = self
            .session
            .lock()
            .map_err(|e| VidscanError::Transcription(format!("Session lock poisoned: {}", e)))?;

        let client = guard.get_or_insert_with(|| {
            info!("Opening Whisper session ({})", self.model);
            create_client(self.request_timeout)
        });
        Ok(client.clone())
    }

    /// Transcribe a single audio file (no splitting).
    #[instrument(skip(self, client), fields(audio_path = %audio_path.display()))]
    async fn transcribe_single(
        &self,
        client: &Client<OpenAIConfig>,
        audio_path: &Path,
        language: Option<&str>,
    ) -> Result<(Vec<TranscriptSegment>, String)> {
        debug!("Transcribing audio file");

        let file_bytes = tokio::fs::read(audio_path).await.map_err(|e| {
            VidscanError::Transcription(format!("Cannot read {}: {}", audio_path.display(), e))
        })?;

        let mut request_builder = CreateTranscriptionRequestArgs::default();
        request_builder
            .file(AudioInput::from_vec_u8(
                audio_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("audio.wav")
                    .to_string(),
                file_bytes,
            ))
            .model(&self.model)
            .response_format(AudioResponseFormat::VerboseJson);

        if let Some(lang) = language {
            request_builder.language(lang);
        }

        let request = request_builder
            .build()
            .map_err(|e| VidscanError::Transcription(format!("Failed to build request: {}", e)))?;

        let response = client
            .audio()
            .transcribe_verbose_json(request)
            .await
            .map_err(|e| VidscanError::Transcription(format!("Whisper API error: {}", e)))?;

        let segments: Vec<TranscriptSegment> = response
            .segments
            .map(|segs| {
                segs.iter()
                    .map(|s| TranscriptSegment::new(s.start as f64, s.end as f64, s.text.trim().to_string()))
                    .collect()
            })
            .unwrap_or_else(|| {
                // No segment breakdown: one segment spanning the whole file
                vec![TranscriptSegment::new(
                    0.0,
                    response.duration as f64,
                    response.text.trim().to_string(),
                )]
            });

        debug!("Transcribed {} segments", segments.len());
        Ok((segments, response.language))
    }

    /// Transcribe an audio file, splitting if necessary.
    async fn transcribe_with_splitting(
        &self,
        audio_path: &Path,
        language: Option<&str>,
    ) -> Result<Transcript> {
        let client = self.session()?;

        let temp_dir = chunk_dir(audio_path)?;
        let chunks = split_audio(audio_path, temp_dir.path(), self.chunk_duration_seconds).await?;

        if chunks.len() == 1 {
            let (segments, detected) = self.transcribe_single(&client, audio_path, language).await?;
            return Ok(Transcript::new(segments, pick_language(language, detected)));
        }

        let chunk_count = chunks.len();
        info!("Processing {} audio chunks with {}", chunk_count, self.model);

        let pb = ProgressBar::new(chunk_count as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("  {spinner:.green} Whisper   [{bar:30.cyan/blue}] {pos}/{len}")
        {
            pb.set_style(style.progress_chars("█▓░"));
        }

        // Bounded concurrency, fail fast on the first chunk error
        let mut results: Vec<(usize, f64, Vec<TranscriptSegment>, String)> = Vec::with_capacity(chunk_count);

        let mut stream = stream::iter(chunks.into_iter().enumerate())
            .map(|(idx, (chunk_path, time_offset))| {
                let client = client.clone();
                async move {
                    let result = self.transcribe_single(&client, &chunk_path, language).await;
                    (idx, time_offset, result)
                }
            })
            .buffer_unordered(self.max_concurrent_chunks);

        while let Some((idx, time_offset, result)) = stream.next().await {
            pb.inc(1);
            match result {
                Ok((segments, detected)) => results.push((idx, time_offset, segments, detected)),
                Err(e) => {
                    pb.finish_and_clear();
                    return Err(VidscanError::Transcription(format!(
                        "Chunk {} at {:.0}s failed: {}",
                        idx, time_offset, e
                    )));
                }
            }
        }

        pb.finish_and_clear();

        results.sort_by_key(|(idx, _, _, _)| *idx);

        let detected = results
            .first()
            .map(|(_, _, _, lang)| lang.clone())
            .unwrap_or_default();

        let all_segments: Vec<TranscriptSegment> = results
            .into_iter()
            .flat_map(|(_, offset, segments, _)| segments.into_iter().map(move |s| s.offset_by(offset)))
            .collect();

        Ok(Transcript::new(all_segments, pick_language(language, detected)))
    }
}

/// Segments go next to the source so they stay inside its scratch directory.
fn chunk_dir(audio_path: &Path) -> Result<TempDir> {
    let parent = audio_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok(tempfile::Builder::new().prefix("chunks-").tempdir_in(parent)?)
}

/// Prefer the detected language; fall back to the hint, then "unknown".
fn pick_language(hint: Option<&str>, detected: String) -> String {
    if !detected.is_empty() {
        detected
    } else {
        hint.unwrap_or("unknown").to_string()
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio_path: &Path, language: Option<&str>) -> Result<Transcript> {
        self.transcribe_with_splitting(audio_path, language).await
    }

    fn release(&self) {
        let mut guard = match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.take().is_some() {
            info!("Whisper session released");
        }
    }
}

/// Check if the OpenAI API key is configured.
pub fn is_api_key_configured() -> bool {
    std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_without_acquire_is_noop() {
        let transcriber = WhisperTranscriber::with_config(&TranscriptionSettings::default());
        assert!(!transcriber.is_loaded());
        transcriber.release();
        transcriber.release();
        assert!(!transcriber.is_loaded());
    }

    #[test]
    fn test_session_acquire_and_release() {
        let transcriber = WhisperTranscriber::with_config(&TranscriptionSettings::default());
        transcriber.session().unwrap();
        assert!(transcriber.is_loaded());

        transcriber.release();
        assert!(!transcriber.is_loaded());
    }

    #[test]
    fn test_chunk_dir_lives_beside_audio() {
        let scratch = tempfile::tempdir().unwrap();
        let audio = scratch.path().join("dQw4w9WgXcQ.wav");

        let chunks = chunk_dir(&audio).unwrap();
        assert_eq!(chunks.path().parent(), Some(scratch.path()));

        let path = chunks.path().to_path_buf();
        drop(chunks);
        assert!(!path.exists());
    }

    #[test]
    fn test_pick_language() {
        assert_eq!(pick_language(Some("en"), "english".to_string()), "english");
        assert_eq!(pick_language(Some("en"), String::new()), "en");
        assert_eq!(pick_language(None, String::new()), "unknown");
    }
}
