// src/main.rs

use anyhow::{Context, Result};
use artefact_downloader::archive::SevenZip;
use artefact_downloader::config::Config;
use artefact_downloader::http::HttpClient;
use artefact_downloader::manager::DownloadManager;
use artefact_downloader::Error;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "artefact-downloader")]
#[command(author, version, about = "Automates the downloading of installer files and images", long_about = None)]
struct Cli {
    /// Location of the configuration file
    config_path: PathBuf,

    /// Resolve and check every source without downloading anything
    #[arg(short = 'd', long = "dryrun", alias = "dry-run")]
    dry_run: bool,

    /// Run-state file (overrides stateFile from the configuration)
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load(&cli.config_path)
        .with_context(|| format!("Cannot use configuration {}", cli.config_path.display()))?;

    if let Some(state_file) = cli.state_file {
        config.state_file = state_file;
    }

    // Checked up front so a missing tool fails before any network access
    let archiver = SevenZip::locate(&config.settings.archiver)?;
    debug!("Archive tool: {}", archiver.executable().display());

    let transport = HttpClient::new(&config.settings)?;

    info!(
        "Starting {}run with state file {}",
        if cli.dry_run { "dry " } else { "" },
        config.state_file.display()
    );

    let report = DownloadManager::new(&config, &transport, &archiver)
        .dry_run(cli.dry_run)
        .run()?;

    for line in report.lines() {
        println!("{}", line);
    }

    if !report.failed.is_empty() {
        return Err(Error::DownloadError(format!(
            "{} of {} artefacts failed to download",
            report.failed.len(),
            report.resolved.len()
        ))
        .into());
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let code = e.downcast_ref::<Error>().map(Error::exit_code).unwrap_or(1);
            ExitCode::from(code)
        }
    }
}
