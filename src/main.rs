//! vidscan CLI entry point.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vidscan::cli::{commands, Cli, Commands};
use vidscan::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.as_deref().map(Settings::expand_path);
    let settings = Settings::load_from(config_path.as_ref())?;

    // Initialize logging; -v flags override the configured level
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("vidscan={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Ensure data directories exist
    std::fs::create_dir_all(settings.data_dir())?;
    std::fs::create_dir_all(settings.temp_dir())?;

    // Execute command
    match &cli.command {
        Commands::Submit { reference, wait } => {
            commands::run_submit(reference, *wait, settings).await?;
        }

        Commands::Run { job_id } => {
            commands::run_job(*job_id, settings).await?;
        }

        Commands::Status { job_id } => {
            commands::run_status(*job_id, settings).await?;
        }

        Commands::Result { job_id, json } => {
            commands::run_result(*job_id, *json, settings).await?;
        }

        Commands::Jobs { limit, status } => {
            commands::run_jobs(*limit, *status, settings).await?;
        }

        Commands::Sweep => {
            commands::run_sweep(settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, *port, settings).await?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, cli.config.as_deref(), settings)?;
        }
    }

    Ok(())
}
