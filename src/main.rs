use anyhow::{Context, Result};
use duofs::{
    config::{example_config, load_config, DEFAULT_CONFIG_FILE},
    observability::{init_logging, shutdown_logging},
    runner::JobRunner,
};
use std::path::PathBuf;
use tracing::{info, warn};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if let Some("--help" | "-h") = args.get(1).map(String::as_str) {
        print_help();
        return Ok(());
    }

    let config_path = match args.get(1) {
        Some(arg) if !arg.starts_with("--") => PathBuf::from(arg),
        _ => PathBuf::from(DEFAULT_CONFIG_FILE),
    };

    let result = run(config_path);
    shutdown_logging();
    result
}

#[tokio::main]
async fn run(config_path: PathBuf) -> Result<()> {
    let config = load_config(&config_path).await
        .context("Failed to load configuration")?;

    init_logging(
        &config.log_level,
        config.log_directory.as_deref(),
        config.log_rotation.into(),
    )?;

    info!("duofs v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from: {}", config_path.display());

    if let Some(log_dir) = &config.log_directory {
        info!("File logging enabled: {}", log_dir.display());
    } else {
        info!("Console logging only (no log file configured)");
    }

    let runner = JobRunner::from_config(&config);

    tokio::select! {
        result = runner.run_all(&config.jobs) => {
            result?;
            Ok(())
        }
        signal = shutdown_signal() => {
            signal?;
            warn!("Interrupted, remaining jobs were not run");
            anyhow::bail!("Interrupted by shutdown signal")
        }
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())
            .context("Failed to listen for SIGTERM")?;

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl+C")?;
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
            .context("Failed to listen for shutdown signal")?;
        info!("Received shutdown signal (Ctrl+C)");
    }

    Ok(())
}

fn print_help() {
    println!("duofs v{} - Copy, sync and delete files across local disk and S3", env!("CARGO_PKG_VERSION"));
    println!();
    println!("USAGE:");
    println!("  duofs [CONFIG_FILE]    Run the configured jobs (default: {})", DEFAULT_CONFIG_FILE);
    println!("  duofs --help           Show this help");
    println!();
    println!("LOCATIONS:");
    println!("  s3://bucket/prefix/    Object store folder or key");
    println!("  ./any/local/path       Local file or directory");
    println!();
    println!("EXAMPLE CONFIG:");
    println!("{}", example_config());
}
