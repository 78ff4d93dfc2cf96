//! Transcription module for vidscan.
//!
//! Handles speech-to-text over the normalized audio artifact. A transcriber may
//! hold an expensive session or model; the pipeline calls [`Transcriber::release`]
//! once transcription is done so the analysis stage does not compete with it.

mod models;
mod whisper;

pub use models::{format_timestamp, Transcript, TranscriptSegment};
pub use whisper::{is_api_key_configured, WhisperTranscriber};

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Trait for transcription services.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio file, optionally hinting the spoken language.
    ///
    /// Any heavyweight resource is acquired lazily on the first call.
    async fn transcribe(&self, audio_path: &Path, language: Option<&str>) -> Result<Transcript>;

    /// Drop whatever [`Transcriber::transcribe`] acquired.
    ///
    /// Safe to call when nothing was acquired, and more than once.
    fn release(&self);
}
