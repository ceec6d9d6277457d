use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use headliner::app::App;
use headliner::config::{Config, Credentials};
use headliner::store;

#[derive(Parser, Debug)]
#[command(name = "headliner", about = "Telegram bot broadcasting periodic tech news digests")]
struct Args {
    /// Path to the TOML config file (missing file uses defaults)
    #[arg(long, value_name = "FILE", default_value = "headliner.toml")]
    config: PathBuf,

    /// Override the data directory holding subscribers.txt and sent_urls.txt
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Run a single broadcast cycle and exit (for cron-style operation)
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config).context("Failed to load configuration")?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }

    // Missing credentials are startup-fatal
    let credentials = Credentials::from_env().context(
        "Credentials missing: set NEWS_API_KEY and BOT_TOKEN in the environment",
    )?;

    if !config.data_dir.exists() {
        std::fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("Failed to create data directory {}", config.data_dir.display())
        })?;
        tracing::info!(path = %config.data_dir.display(), "Created data directory");
    }

    let store = store::spawn(&config.data_dir).context("Failed to open stores")?;
    let client = reqwest::Client::new();
    let app = App::new(config, &credentials, client, store);

    if args.once {
        let outcome = app.run_cycle(None).await?;
        tracing::info!(outcome = ?outcome, "Single cycle complete");
        return Ok(());
    }

    tracing::info!("Starting scheduler and command listener");
    tokio::join!(app.run_scheduler(), app.run_listener());

    // Both loops run forever; reaching this point means the runtime is
    // shutting down.
    Ok(())
}
