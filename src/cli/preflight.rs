//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and configuration are available before
//! picking up a job, so a missing binary fails fast instead of leaving a
//! job failed at its first stage.

use crate::error::{Result, VidscanError};
use crate::transcription::is_api_key_configured;
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Running the pipeline needs every external tool and the API key.
    Process,
    /// Reading job records needs nothing external.
    Inspect,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation) -> Result<()> {
    match operation {
        Operation::Process => {
            check_api_key()?;
            check_tool("yt-dlp")?;
            check_tool("ffmpeg")?;
            check_tool("ffprobe")?;
        }
        Operation::Inspect => {}
    }
    Ok(())
}

fn check_api_key() -> Result<()> {
    if is_api_key_configured() {
        Ok(())
    } else {
        Err(VidscanError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        ))
    }
}

/// Check if an external tool is available.
fn check_tool(name: &str) -> Result<()> {
    // ffmpeg/ffprobe use -version (single dash)
    let version_arg = match name {
        "ffmpeg" | "ffprobe" => "-version",
        _ => "--version",
    };
    match Command::new(name).arg(version_arg).output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(VidscanError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(VidscanError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(VidscanError::ToolNotFound(format!("{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inspect_has_no_requirements() {
        assert!(check(Operation::Inspect).is_ok());
    }

    #[test]
    fn test_missing_tool_is_reported() {
        let err = check_tool("vidscan-no-such-tool").unwrap_err();
        assert!(matches!(err, VidscanError::ToolNotFound(name) if name == "vidscan-no-such-tool"));
    }
}
