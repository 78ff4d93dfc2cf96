//! Media fetching for vidscan.
//!
//! A [`MediaFetcher`] resolves a source reference into video metadata and a
//! local audio artifact. The pipeline only sees this trait.

mod youtube;

pub use youtube::{extract_video_id, YtDlpFetcher};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Metadata about a remote video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Provider-side video ID.
    pub id: String,
    pub title: String,
    pub duration_seconds: Option<u32>,
    pub uploader: Option<String>,
    /// Upload date as reported by the provider (YYYYMMDD).
    pub upload_date: Option<String>,
    pub view_count: Option<u64>,
    pub thumbnail_url: Option<String>,
    /// Leading slice of the description.
    pub description_excerpt: String,
}

/// Trait for media providers.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Fetch metadata without downloading media.
    async fn fetch_metadata(&self, reference: &str) -> Result<VideoMetadata>;

    /// Download the audio track into `output_dir` and return its path.
    async fn fetch_audio(&self, reference: &str, output_dir: &Path) -> Result<PathBuf>;
}

/// Truncate to at most `max_chars` characters on a char boundary.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
