//! Configuration settings for vidscan.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub pipeline: PipelineSettings,
    pub fetch: FetchSettings,
    pub transcription: TranscriptionSettings,
    pub analysis: AnalysisSettings,
    pub store: StoreSettings,
    pub worker: WorkerSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Root for per-job scratch directories.
    pub temp_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.vidscan".to_string(),
            temp_dir: "/tmp/vidscan".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Settings for a single pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Wall-clock ceiling for one job, in seconds.
    pub timeout_seconds: u64,
    /// Sample rate of the normalized audio.
    pub sample_rate: u32,
    /// Channel count of the normalized audio.
    pub channels: u16,
    /// Language hint passed to the transcriber (auto-detect if unset).
    pub language_hint: Option<String>,
    /// Attempts for the final completed/failed write.
    pub terminal_write_attempts: u32,
    /// Backoff between terminal write attempts, multiplied by the attempt number.
    pub terminal_write_backoff_ms: u64,
    /// Age after which a `processing` job is considered abandoned.
    pub stale_after_seconds: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 3600,
            sample_rate: 16000,
            channels: 1,
            language_hint: None,
            terminal_write_attempts: 3,
            terminal_write_backoff_ms: 500,
            stale_after_seconds: 4500,
        }
    }
}

impl PipelineSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Media fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// User agent presented to the video host.
    pub user_agent: String,
    /// How much of the description to keep in metadata.
    pub description_excerpt_chars: usize,
    /// Longest video accepted for processing, in seconds.
    pub max_duration_seconds: u32,
    /// yt-dlp executable, looked up on PATH unless absolute.
    pub ytdlp_path: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            description_excerpt_chars: 500,
            max_duration_seconds: 7200, // 2 hours
            ytdlp_path: "yt-dlp".to_string(),
        }
    }
}

/// Transcription provider type.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionProvider {
    /// OpenAI Whisper API.
    #[default]
    Whisper,
}

impl std::str::FromStr for TranscriptionProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "whisper" | "openai" => Ok(TranscriptionProvider::Whisper),
            _ => Err(format!("Unknown transcription provider: {}", s)),
        }
    }
}

impl std::fmt::Display for TranscriptionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptionProvider::Whisper => write!(f, "whisper"),
        }
    }
}

/// Transcription service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    pub provider: TranscriptionProvider,
    /// Whisper model to use.
    pub model: String,
    /// Duration in seconds for splitting long audio files.
    pub chunk_duration_seconds: u32,
    /// Maximum concurrent chunk requests.
    pub max_concurrent_chunks: usize,
    /// Per-request HTTP timeout for the transcription API.
    pub request_timeout_seconds: u64,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            provider: TranscriptionProvider::Whisper,
            model: "whisper-1".to_string(),
            // 16 kHz mono PCM stays under the 25 MB upload limit
            chunk_duration_seconds: 600,
            max_concurrent_chunks: 3,
            request_timeout_seconds: 300,
        }
    }
}

/// Content analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Analysis provider (openai).
    pub provider: String,
    /// Chat model used for the verdict.
    pub model: String,
    /// Transcript characters sent to the model.
    pub max_transcript_chars: usize,
    /// Directory holding an `analysis.toml` prompt override.
    pub prompts_dir: Option<String>,
    /// Custom variables available in prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
    /// Per-request HTTP timeout for the chat API.
    pub request_timeout_seconds: u64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_transcript_chars: 12000,
            prompts_dir: None,
            variables: Default::default(),
            request_timeout_seconds: 120,
        }
    }
}

/// Job store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Path to the SQLite job database.
    pub sqlite_path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.vidscan/jobs.db".to_string(),
        }
    }
}

/// In-process worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Jobs executed at the same time.
    pub max_concurrent_jobs: usize,
    /// Dispatch queue depth.
    pub queue_capacity: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            queue_capacity: 64,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::VidscanError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vidscan")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.store.sqlite_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [pipeline]
            timeout_seconds = 90

            [analysis]
            model = "gpt-4.1"
            "#,
        )
        .unwrap();

        assert_eq!(settings.pipeline.timeout(), Duration::from_secs(90));
        assert_eq!(settings.pipeline.sample_rate, 16000);
        assert_eq!(settings.analysis.model, "gpt-4.1");
        assert_eq!(settings.transcription.model, "whisper-1");
    }

    #[test]
    fn test_save_and_load_roundtrip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut settings = Settings::default();
        settings.worker.max_concurrent_jobs = 5;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.worker.max_concurrent_jobs, 5);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = PathBuf::from("/nonexistent/vidscan/config.toml");
        let settings = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(settings.pipeline.timeout_seconds, 3600);
    }
}
