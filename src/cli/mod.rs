//! CLI module for vidscan.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use crate::job::{JobId, JobStatus};
use clap::{Parser, Subcommand};

/// vidscan - Video content screening
///
/// Fetches a video's audio, transcribes it, and asks a language model whether
/// the content looks AI-generated or harmful. Jobs are tracked in a local
/// database and can be driven from the command line or over HTTP.
#[derive(Parser, Debug)]
#[command(name = "vidscan")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "VIDSCAN_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit a video for analysis
    Submit {
        /// YouTube URL or video ID
        reference: String,

        /// Run the job in this process and print the result
        #[arg(short, long)]
        wait: bool,
    },

    /// Run a pending job in this process
    Run {
        /// Job ID
        job_id: JobId,
    },

    /// Show the status of a job
    Status {
        /// Job ID
        job_id: JobId,
    },

    /// Show the result of a finished job
    Result {
        /// Job ID
        job_id: JobId,

        /// Print the full record as JSON
        #[arg(long)]
        json: bool,
    },

    /// List recent jobs
    Jobs {
        /// Maximum number of jobs to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Only show jobs in this state (pending, processing, completed, failed)
        #[arg(short, long)]
        status: Option<JobStatus>,
    },

    /// Fail jobs left in processing by a worker that stopped
    Sweep,

    /// Start the HTTP API server and in-process worker
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8000")]
        port: u16,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_job_commands() {
        let cli = Cli::try_parse_from(["vidscan", "result", "#12", "--json"]).unwrap();
        match cli.command {
            Commands::Result { job_id, json } => {
                assert_eq!(job_id, JobId(12));
                assert!(json);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let cli = Cli::try_parse_from(["vidscan", "jobs", "--status", "failed", "-l", "5"]).unwrap();
        match cli.command {
            Commands::Jobs { limit, status } => {
                assert_eq!(limit, 5);
                assert_eq!(status, Some(JobStatus::Failed));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_job_id() {
        assert!(Cli::try_parse_from(["vidscan", "status", "abc"]).is_err());
    }
}
