//! YouTube media fetcher backed by yt-dlp.

use super::{excerpt, MediaFetcher, VideoMetadata};
use crate::config::FetchSettings;
use crate::error::{Result, VidscanError};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use tokio::process::Command;
use tracing::{debug, info, instrument};

const EXTRACTOR_ARGS: &str = "youtube:player_client=android,web;skip=hls,dash";

fn video_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Matches various YouTube URL formats and bare video IDs
        Regex::new(
            r"(?x)
            (?:
                (?:https?://)?
                (?:www\.|m\.)?
                (?:youtube\.com/watch\?(?:.*&)?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/v/|youtube\.com/shorts/)
                ([a-zA-Z0-9_-]{11})
            )
            |
            ^([a-zA-Z0-9_-]{11})$
        ",
        )
        .expect("static regex is valid")
    })
}

/// Extract the video ID from a YouTube URL or bare ID.
pub fn extract_video_id(input: &str) -> Option<String> {
    let caps = video_id_regex().captures(input.trim())?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// YouTube fetcher using the yt-dlp CLI.
pub struct YtDlpFetcher {
    program: String,
    user_agent: String,
    description_excerpt_chars: usize,
}

impl YtDlpFetcher {
    pub fn new(settings: &FetchSettings) -> Self {
        Self {
            program: settings.ytdlp_path.clone(),
            user_agent: settings.user_agent.clone(),
            description_excerpt_chars: settings.description_excerpt_chars,
        }
    }

    fn resolve(&self, reference: &str) -> Result<(String, String)> {
        let video_id = extract_video_id(reference).ok_or_else(|| {
            VidscanError::Fetch(format!("Invalid YouTube video ID or URL: {}", reference))
        })?;
        let url = format!("https://www.youtube.com/watch?v={}", video_id);
        Ok((video_id, url))
    }

    /// yt-dlp with the shared flags. The child is killed if the caller's
    /// future is dropped, e.g. when the pipeline times out.
    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.kill_on_drop(true)
            .arg("--user-agent")
            .arg(&self.user_agent)
            .arg("--extractor-args")
            .arg(EXTRACTOR_ARGS)
            .arg("--no-playlist")
            .arg("--no-warnings");
        cmd
    }

    /// Map a yt-dlp JSON dump onto our metadata shape.
    fn parse_metadata(&self, video_id: &str, json: &serde_json::Value) -> VideoMetadata {
        VideoMetadata {
            id: json["id"].as_str().unwrap_or(video_id).to_string(),
            title: json["title"].as_str().unwrap_or("Unknown").to_string(),
            duration_seconds: json["duration"].as_f64().map(|d| d as u32),
            uploader: json["uploader"]
                .as_str()
                .or_else(|| json["channel"].as_str())
                .map(|s| s.to_string()),
            upload_date: json["upload_date"].as_str().map(|s| s.to_string()),
            view_count: json["view_count"].as_u64(),
            thumbnail_url: json["thumbnail"].as_str().map(|s| s.to_string()),
            description_excerpt: excerpt(
                json["description"].as_str().unwrap_or_default(),
                self.description_excerpt_chars,
            ),
        }
    }

    fn spawn_error(&self, e: std::io::Error) -> VidscanError {
        if e.kind() == std::io::ErrorKind::NotFound {
            VidscanError::ToolNotFound(self.program.clone())
        } else {
            VidscanError::Fetch(format!("{} execution failed: {e}", self.program))
        }
    }
}

/// Locates a downloaded audio file by video ID.
fn find_audio_file(dir: &Path, video_id: &str) -> Result<PathBuf> {
    for ext in &["mp3", "opus", "m4a", "webm", "ogg"] {
        let candidate = dir.join(format!("{}.{}", video_id, ext));
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    let entries = std::fs::read_dir(dir)
        .map_err(|e| VidscanError::Fetch(format!("Cannot read directory: {e}")))?;

    for entry in entries.flatten() {
        if entry.file_name().to_string_lossy().starts_with(video_id) {
            return Ok(entry.path());
        }
    }

    Err(VidscanError::Fetch("Audio file not found after download".into()))
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    #[instrument(skip(self))]
    async fn fetch_metadata(&self, reference: &str) -> Result<VideoMetadata> {
        let (video_id, url) = self.resolve(reference)?;

        let output = self
            .base_command()
            .arg("--dump-json")
            .arg("--skip-download")
            .arg(&url)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VidscanError::Fetch(format!(
                "Video {} not found or unavailable: {}",
                video_id,
                stderr.trim()
            )));
        }

        let json: serde_json::Value = serde_json::from_slice(&output.stdout).map_err(|e| {
            VidscanError::Fetch(format!("Failed to parse yt-dlp output: {}", e))
        })?;

        let metadata = self.parse_metadata(&video_id, &json);
        debug!("Fetched metadata for {}: {}", metadata.id, metadata.title);
        Ok(metadata)
    }

    #[instrument(skip(self, output_dir))]
    async fn fetch_audio(&self, reference: &str, output_dir: &Path) -> Result<PathBuf> {
        let (video_id, url) = self.resolve(reference)?;
        std::fs::create_dir_all(output_dir)?;

        info!("Downloading audio from {}", url);

        let template = output_dir.join(format!("{}.%(ext)s", video_id));

        let output = self
            .base_command()
            .arg("--format").arg("bestaudio/best")
            .arg("--extract-audio")
            .arg("--audio-format").arg("mp3")
            .arg("--audio-quality").arg("192K")
            .arg("--output").arg(&template)
            .arg("--quiet")
            .arg(&url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VidscanError::Fetch(format!("yt-dlp failed: {}", stderr.trim())));
        }

        find_audio_file(output_dir, &video_id)
    }
}
