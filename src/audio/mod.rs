//! Audio processing for vidscan.
//!
//! Converts downloaded audio into the normalized PCM WAV the transcriber
//! expects, and splits long files into segments.

mod ffmpeg;

pub use ffmpeg::{probe_duration, split_audio, FfmpegTranscoder};

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Trait for audio transcoders.
#[async_trait]
pub trait AudioTranscoder: Send + Sync {
    /// Convert `source` to a mono/stereo PCM file at `sample_rate` Hz.
    ///
    /// The output is written next to the source and its path returned.
    async fn transcode(&self, source: &Path, sample_rate: u32, channels: u16) -> Result<PathBuf>;
}
