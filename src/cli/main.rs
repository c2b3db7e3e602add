use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use phototag_batch::config;
use phototag_batch::pipeline;
use phototag_batch::tagging::{PhotoTagClient, TaggingService};

#[derive(Parser, Debug)]
#[command(
    name = "phototag-batch",
    version,
    about = "Tag every JPEG in a folder with PhotoTag.ai and sort them into ready/ and failed/"
)]
struct Cli {
    /// Folder containing the JPEG images to process
    #[arg(value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// API token (overrides the config file)
    #[arg(long, value_name = "TOKEN")]
    token: Option<String>,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    let Some(dir) = cli.dir else {
        anyhow::bail!("No input folder specified. Use --help for usage.");
    };

    // Load config
    let mut config = config::Config::load(cli.config.as_deref())?;
    if let Some(token) = cli.token {
        config.service.api_token = token;
    }
    config.validate()?;

    let client = PhotoTagClient::new(&config.service);
    log::info!("Tagging service: {} ({})", client.name(), client.endpoint());

    let report = pipeline::run_batch(&dir, &client, &config.output, |outcome, progress| {
        match outcome.failure {
            Some(ref err) => log::error!(
                "  {} → {}: {err}",
                outcome.file_name(),
                outcome.destination.as_str()
            ),
            None => log::info!(
                "  {} → {}",
                outcome.file_name(),
                outcome.destination.as_str()
            ),
        }
        if let Some(ref err) = outcome.move_error {
            log::error!("  Could not move {}: {err}", outcome.file_name());
        }
        log::info!("  Progress: {}% ({}/{})", progress.percent, progress.done, progress.total);
    })
    .await?;

    // JSON output
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if report.total() == 0 {
        log::warn!("No JPEG images found in {}", dir.display());
    }

    Ok(())
}
