//! CLI output formatting utilities.

use crate::job::{Job, JobStatus};
use crate::media::excerpt;
use crate::service::JobSummary;
use crate::transcription::{format_timestamp, TranscriptSegment};
use console::{style, StyledObject};
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// One line per job, for listings.
    pub fn job_line(job: &JobSummary) {
        println!(
            "  {} #{:<5} {:<10} {} ({})",
            style("*").cyan(),
            job.job_id,
            status_style(job.status),
            style(job.title.as_deref().unwrap_or(&job.source_reference)).bold(),
            style(job.created_at.format("%Y-%m-%d %H:%M")).dim()
        );
    }

    /// Status block for a single job.
    pub fn job_status(job: &JobSummary) {
        Output::header(&format!("Job #{}", job.job_id));
        println!("  {}: {}", style("Status").dim(), status_style(job.status));
        Output::kv("Source", &job.source_reference);
        if let Some(title) = &job.title {
            Output::kv("Title", title);
        }
        Output::kv("Created", &job.created_at.to_rfc3339());
        if let Some(completed) = job.completed_at {
            Output::kv("Finished", &completed.to_rfc3339());
        }
        if let Some(error) = &job.error_message {
            Output::kv("Error", error);
        }
    }

    /// Full report for a terminal job.
    pub fn job_result(job: &Job) {
        Output::job_status(&JobSummary::from(job));

        let Some(result) = &job.result else {
            return;
        };

        let metadata = &result.metadata;
        Output::header("Video");
        Output::kv("Title", &metadata.title);
        if let Some(uploader) = &metadata.uploader {
            Output::kv("Uploader", uploader);
        }
        if let Some(duration) = metadata.duration_seconds {
            Output::kv("Duration", &format_duration(f64::from(duration)));
        }
        if let Some(views) = metadata.view_count {
            Output::kv("Views", &views.to_string());
        }

        let verdict = &result.analysis;
        Output::header("Analysis");
        Output::kv("AI-generated score", &format!("{}/100", verdict.ai_generated_score));
        if verdict.dangerous_content {
            let severity = verdict
                .danger_severity
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unspecified".to_string());
            println!(
                "  {}: {} ({})",
                style("Dangerous").dim(),
                style("yes").red().bold(),
                severity
            );
            Output::kv("Categories", &verdict.danger_categories.join(", "));
        } else {
            println!("  {}: {}", style("Dangerous").dim(), style("no").green());
        }
        if let Some(explanation) = &verdict.explanation {
            Output::kv("Explanation", explanation);
        }

        let transcript = &result.transcript;
        Output::header("Transcript");
        Output::kv("Language", &transcript.language);
        Output::kv("Segments", &transcript.segments.len().to_string());
        Output::kv("Length", &format_duration(transcript.duration_seconds()));
        println!();
        for line in segment_lines(&transcript.segments, 5) {
            println!("   {}", line);
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

fn status_style(status: JobStatus) -> StyledObject<&'static str> {
    let s = style(status.as_str());
    match status {
        JobStatus::Pending => s.dim(),
        JobStatus::Processing => s.yellow(),
        JobStatus::Completed => s.green(),
        JobStatus::Failed => s.red(),
    }
}

/// Format duration in seconds to a human-readable string.
fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u32;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Single-line preview with ellipsis.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        format!("{}...", excerpt(&content, max_chars))
    }
}

/// The first `limit` segments as `[mm:ss] text`, plus a count of the rest.
fn segment_lines(segments: &[TranscriptSegment], limit: usize) -> Vec<String> {
    let mut lines: Vec<String> = segments
        .iter()
        .take(limit)
        .map(|s| format!("[{}] {}", format_timestamp(s.start), content_preview(&s.text, 100)))
        .collect();
    if segments.len() > limit {
        lines.push(format!("... {} more segment(s)", segments.len() - limit));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_lines() {
        let segments = vec![
            TranscriptSegment::new(0.0, 2.0, "We're no strangers".to_string()),
            TranscriptSegment::new(61.0, 64.5, "to love".to_string()),
            TranscriptSegment::new(64.5, 66.0, "you know the rules".to_string()),
        ];
        assert_eq!(
            segment_lines(&segments, 2),
            vec![
                "[00:00] We're no strangers".to_string(),
                "[01:01] to love".to_string(),
                "... 1 more segment(s)".to_string(),
            ]
        );
        assert!(segment_lines(&[], 5).is_empty());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(42.0), "42s");
        assert_eq!(format_duration(212.0), "3m 32s");
        assert_eq!(format_duration(3725.0), "1h 2m 5s");
    }

    #[test]
    fn test_content_preview() {
        assert_eq!(content_preview("line one\nline two", 100), "line one line two");
        assert_eq!(content_preview("ééééé", 3), "ééé...");
    }
}
