//! ffmpeg/ffprobe-backed audio utilities.

use super::AudioTranscoder;
use crate::error::{Result, VidscanError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Transcoder shelling out to ffmpeg.
#[derive(Debug, Default, Clone)]
pub struct FfmpegTranscoder;

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self
    }

    /// Output path for a normalized copy of `source`.
    fn output_path(source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("audio");
        let name = if source.extension().is_some_and(|e| e == "wav") {
            format!("{}.norm.wav", stem)
        } else {
            format!("{}.wav", stem)
        };
        source.with_file_name(name)
    }
}

#[async_trait]
impl AudioTranscoder for FfmpegTranscoder {
    #[instrument(skip(self), fields(source = %source.display()))]
    async fn transcode(&self, source: &Path, sample_rate: u32, channels: u16) -> Result<PathBuf> {
        let dest = Self::output_path(source);
        debug!("Converting {:?} to {} Hz / {} ch PCM", source, sample_rate, channels);

        let result = Command::new("ffmpeg")
        .kill_on_drop(true)
            .arg("-i").arg(source)
            .arg("-vn")
            .arg("-acodec").arg("pcm_s16le")
            .arg("-ar").arg(sample_rate.to_string())
            .arg("-ac").arg(channels.to_string())
            .arg("-y")
            .arg("-loglevel").arg("error")
            .arg(&dest)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        match result {
            Ok(out) if out.status.success() => Ok(dest),
            Ok(out) => {
                let err = String::from_utf8_lossy(&out.stderr);
                Err(VidscanError::Transcode(format!("ffmpeg conversion failed: {}", err.trim())))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(VidscanError::ToolNotFound("ffmpeg".into()))
            }
            Err(e) => Err(VidscanError::Transcode(format!("ffmpeg error: {e}"))),
        }
    }
}

/// Segments a long audio file into smaller chunks for processing.
///
/// Each chunk will be approximately `chunk_seconds` long. Returns tuples of
/// (chunk_path, offset_seconds) for each segment.
#[instrument(skip_all)]
pub async fn split_audio(
    source: &Path,
    output_dir: &Path,
    chunk_seconds: u32,
) -> Result<Vec<(PathBuf, f64)>> {
    std::fs::create_dir_all(output_dir)?;

    let total_duration = probe_duration(source).await?;
    info!("Total audio duration: {:.1}s", total_duration);

    let chunk_len = chunk_seconds as f64;

    // Short audio doesn't need splitting
    if total_duration <= chunk_len {
        return Ok(vec![(source.to_path_buf(), 0.0)]);
    }

    let base_name = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("audio");

    let mut segments = Vec::new();
    let mut offset = 0.0;
    let mut idx = 0u32;

    while offset < total_duration {
        let segment_path = output_dir.join(format!("{}_{:04}.wav", base_name, idx));
        let segment_len = chunk_len.min(total_duration - offset);

        extract_segment(source, &segment_path, offset, segment_len).await?;

        debug!("Created segment {} at offset {:.1}s", idx, offset);
        segments.push((segment_path, offset));

        offset += chunk_len;
        idx += 1;
    }

    info!("Created {} audio segments", segments.len());
    Ok(segments)
}

/// Extracts a time segment from an audio file.
async fn extract_segment(source: &Path, dest: &Path, start: f64, length: f64) -> Result<()> {
    // PCM input can always be stream-copied
    let copy_result = Command::new("ffmpeg")
        .kill_on_drop(true)
        .arg("-ss").arg(format!("{:.3}", start))
        .arg("-i").arg(source)
        .arg("-t").arg(format!("{:.3}", length))
        .arg("-c").arg("copy")
        .arg("-y")
        .arg("-loglevel").arg("warning")
        .arg(dest)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    if let Ok(status) = copy_result {
        if status.success() && dest.exists() {
            return Ok(());
        }
    }

    warn!("Stream copy failed, re-encoding segment");

    let encode_result = Command::new("ffmpeg")
        .kill_on_drop(true)
        .arg("-ss").arg(format!("{:.3}", start))
        .arg("-i").arg(source)
        .arg("-t").arg(format!("{:.3}", length))
        .arg("-acodec").arg("pcm_s16le")
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(dest)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    match encode_result {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            Err(VidscanError::Transcription(format!("Segment extraction failed: {err}")))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(VidscanError::ToolNotFound("ffmpeg".into()))
        }
        Err(e) => Err(VidscanError::Transcription(format!("ffmpeg error: {e}"))),
    }
}

/// Queries the duration of an audio file using ffprobe with JSON output.
pub async fn probe_duration(path: &Path) -> Result<f64> {
    let result = Command::new("ffprobe")
        .kill_on_drop(true)
        .arg("-v").arg("quiet")
        .arg("-print_format").arg("json")
        .arg("-show_format")
        .arg(path)
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(VidscanError::ToolNotFound("ffprobe".into()));
        }
        Err(e) => {
            return Err(VidscanError::Transcode(format!("ffprobe failed: {e}")));
        }
    };

    if !output.status.success() {
        return Err(VidscanError::Transcode("ffprobe returned error".into()));
    }

    parse_probe_duration(&output.stdout)
}

fn parse_probe_duration(stdout: &[u8]) -> Result<f64> {
    let parsed: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|_| VidscanError::Transcode("Invalid ffprobe output".into()))?;

    parsed["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| VidscanError::Transcode("Could not determine audio duration".into()))
}
