//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::{Prompts, Settings};
use crate::job::{JobFilter, JobStatus};
use crate::store::{JobStore, SqliteJobStore};
use chrono::Utc;
use console::style;
use std::path::Path;
use std::process::Command;

/// Outcome of a single check.
#[derive(Debug)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    message: String,
    hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.into(),
            hint: None,
        }
    }

    fn warning(name: &str, message: impl Into<String>, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.into(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: impl Into<String>, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.into(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// An external binary the pipeline shells out to.
struct Tool {
    name: &'static str,
    version_arg: &'static str,
    hint: fn() -> &'static str,
}

const TOOLS: &[Tool] = &[
    Tool {
        name: "yt-dlp",
        version_arg: "--version",
        hint: install_hint_ytdlp,
    },
    Tool {
        name: "ffmpeg",
        version_arg: "-version",
        hint: install_hint_ffmpeg,
    },
    Tool {
        name: "ffprobe",
        version_arg: "-version",
        hint: install_hint_ffmpeg,
    },
];

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("vidscan Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let sections = vec![
        ("External Tools", TOOLS.iter().map(check_tool).collect()),
        ("API Configuration", vec![check_openai_api_key()]),
        ("Storage", check_storage(settings).await),
        ("Configuration", check_configuration(settings)),
    ];

    let mut errors = 0;
    let mut warnings = 0;
    for (title, checks) in &sections {
        println!("{}", style(title).bold());
        for check in checks {
            check.print();
            match check.status {
                CheckStatus::Error => errors += 1,
                CheckStatus::Warning => warnings += 1,
                CheckStatus::Ok => {}
            }
        }
        println!();
    }

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Jobs will fail until they are fixed.",
            errors
        ));
        anyhow::bail!("doctor found {} error(s)", errors);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! vidscan is ready to process videos.");
    }

    Ok(())
}

fn check_tool(tool: &Tool) -> CheckResult {
    let hint = (tool.hint)();
    match Command::new(tool.name).arg(tool.version_arg).output() {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let version = stdout.lines().next().unwrap_or("installed").trim();
            CheckResult::ok(tool.name, truncate(version, 50))
        }
        Ok(_) => CheckResult::error(tool.name, "installed but not working", hint),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(tool.name, "not found", hint)
        }
        Err(e) => CheckResult::error(tool.name, format!("error: {}", e), hint),
    }
}

fn check_openai_api_key() -> CheckResult {
    const HINT: &str = "Set with: export OPENAI_API_KEY='sk-...'";
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if key.is_empty() => CheckResult::error("OPENAI_API_KEY", "empty", HINT),
        Ok(key) if key.starts_with("sk-") && key.len() > 20 => {
            CheckResult::ok("OPENAI_API_KEY", format!("configured ({})", mask_key(&key)))
        }
        Ok(_) => CheckResult::warning(
            "OPENAI_API_KEY",
            "set but format looks unusual",
            "Expected format: sk-... (OpenAI API key)",
        ),
        Err(_) => CheckResult::error("OPENAI_API_KEY", "not set", HINT),
    }
}

async fn check_storage(settings: &Settings) -> Vec<CheckResult> {
    let mut results = vec![
        check_writable_dir("Data directory", &settings.data_dir()),
        check_writable_dir("Scratch directory", &settings.temp_dir()),
    ];

    let db_path = settings.sqlite_path();
    if !db_path.exists() {
        results.push(CheckResult::warning(
            "Job database",
            format!("{} (not created yet)", db_path.display()),
            "Database will be created on first submit",
        ));
        return results;
    }

    let store = match SqliteJobStore::new(&db_path) {
        Ok(store) => store,
        Err(e) => {
            results.push(CheckResult::error(
                "Job database",
                format!("{}: {}", db_path.display(), e),
                "Move the file aside to start with an empty job history",
            ));
            return results;
        }
    };

    let size = std::fs::metadata(&db_path)
        .map(|m| format_size(m.len()))
        .unwrap_or_else(|_| "unknown size".to_string());
    results.push(CheckResult::ok(
        "Job database",
        format!("{} ({})", db_path.display(), size),
    ));

    let filter = JobFilter::default()
        .with_status(JobStatus::Processing)
        .with_limit(usize::MAX);
    match store.list(&filter).await {
        Ok(jobs) => {
            let stale_after = settings.pipeline.stale_after_seconds as i64;
            let now = Utc::now();
            let stale = jobs
                .iter()
                .filter(|job| {
                    let since = job.started_at.unwrap_or(job.created_at);
                    (now - since).num_seconds() > stale_after
                })
                .count();
            if stale > 0 {
                results.push(CheckResult::warning(
                    "Stale jobs",
                    format!("{} job(s) stuck in processing", stale),
                    "Mark them failed with: vidscan sweep",
                ));
            }
        }
        Err(e) => results.push(CheckResult::error(
            "Job database",
            format!("unreadable: {}", e),
            "Move the file aside to start with an empty job history",
        )),
    }

    results
}

/// A directory is fine if it exists and accepts a file, or can be created.
fn check_writable_dir(name: &str, dir: &Path) -> CheckResult {
    if !dir.exists() {
        return CheckResult::warning(
            name,
            format!("{} (will be created)", dir.display()),
            "Directory will be created on first use",
        );
    }
    match tempfile::tempfile_in(dir) {
        Ok(_) => CheckResult::ok(name, dir.display().to_string()),
        Err(e) => CheckResult::error(
            name,
            format!("{} is not writable: {}", dir.display(), e),
            "Fix permissions or point the setting at another directory",
        ),
    }
}

fn check_configuration(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let config_path = Settings::default_config_path();
    if config_path.exists() {
        results.push(CheckResult::ok("Config file", config_path.display().to_string()));
    } else {
        results.push(CheckResult::warning(
            "Config file",
            "using defaults",
            "Create one with: vidscan config edit",
        ));
    }

    match Prompts::load(
        settings.analysis.prompts_dir.as_deref(),
        Some(&settings.analysis.variables),
    ) {
        Ok(_) if settings.analysis.prompts_dir.is_some() => {
            results.push(CheckResult::ok("Prompts", "custom prompts loaded"))
        }
        Ok(_) => results.push(CheckResult::ok("Prompts", "built-in")),
        Err(e) => results.push(CheckResult::error(
            "Prompts",
            e.to_string(),
            "Check analysis.toml in your prompts directory",
        )),
    }

    if settings.worker.max_concurrent_jobs == 0 {
        results.push(CheckResult::error(
            "Worker",
            "max_concurrent_jobs is 0",
            "Set worker.max_concurrent_jobs to at least 1",
        ));
    } else {
        results.push(CheckResult::ok(
            "Worker",
            format!(
                "{} concurrent job(s), {}s pipeline timeout",
                settings.worker.max_concurrent_jobs, settings.pipeline.timeout_seconds
            ),
        ));
    }

    results
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 11 {
        return "***".to_string();
    }
    let head: String = chars[..7].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn install_hint_ytdlp() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install yt-dlp"
    } else if cfg!(target_os = "linux") {
        "Install with: pip install yt-dlp (or your package manager)"
    } else {
        "Install from: https://github.com/yt-dlp/yt-dlp"
    }
}

fn install_hint_ffmpeg() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install ffmpeg"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install ffmpeg (or your package manager)"
    } else {
        "Install from: https://ffmpeg.org/download.html"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_check_result_constructors() {
        assert!(CheckResult::ok("x", "fine").hint.is_none());
        let err = CheckResult::error("x", "broken", "fix it");
        assert_eq!(err.status, CheckStatus::Error);
        assert_eq!(err.hint.as_deref(), Some("fix it"));
    }

    #[test]
    fn test_missing_tool_is_an_error() {
        let tool = Tool {
            name: "vidscan-no-such-tool",
            version_arg: "--version",
            hint: install_hint_ytdlp,
        };
        let result = check_tool(&tool);
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.message, "not found");
    }

    #[test]
    fn test_writable_dir() {
        let temp = TempDir::new().unwrap();
        assert_eq!(check_writable_dir("d", temp.path()).status, CheckStatus::Ok);
        let missing = temp.path().join("later");
        assert_eq!(check_writable_dir("d", &missing).status, CheckStatus::Warning);
    }

    #[test]
    fn test_zero_workers_is_an_error() {
        let mut settings = Settings::default();
        settings.worker.max_concurrent_jobs = 0;
        let results = check_configuration(&settings);
        assert!(results
            .iter()
            .any(|r| r.name == "Worker" && r.status == CheckStatus::Error));
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("sk-abcdefghijklmnop1234"), "sk-abcd...1234");
        assert_eq!(mask_key("short"), "***");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.0 GB");
    }
}
