//! Lexicon Daemon - daily vocabulary digest
//!
//! Runs once with `--once`, otherwise waits for the configured cron trigger.

use anyhow::{Context, Result};
use clap::Parser;
use lexicond::acquisition::{AcquisitionLoop, Pacing};
use lexicond::config::{Config, Secrets};
use lexicond::generator::GeminiGenerator;
use lexicond::mailer::{ConsoleMailer, Envelope, Mailer, SmtpMailer};
use lexicond::pipeline::Pipeline;
use lexicond::schedule::{self, DailySchedule};
use lexicond::store::SqliteStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lexicond", version, about = "Daily vocabulary digest daemon")]
struct Cli {
    /// Run the pipeline once and exit
    #[arg(long)]
    once: bool,

    /// Config file (default: /etc/lexicon/config.toml, then ./lexicon.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Number of words to acquire (with --once)
    #[arg(long, value_name = "N")]
    count: Option<usize>,

    /// Print the digest instead of sending it
    #[arg(long)]
    no_mail: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!("Lexicon Daemon v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::load(cli.config.as_deref())?;
    let secrets = Secrets::from_env()?;

    let store_path = config.store_path(&secrets);
    let store = SqliteStore::open(&store_path)
        .with_context(|| format!("Failed to open record store {}", store_path.display()))?;
    info!("Record store at {}", store_path.display());

    let generator = GeminiGenerator::new(config.generator.clone(), secrets.api_key.clone())?;
    let acquisition = AcquisitionLoop::new(
        Arc::new(generator),
        Arc::new(store),
        Pacing::from(&config.acquisition),
    );

    let (mailer, envelope): (Arc<dyn Mailer>, Envelope) = if cli.no_mail {
        let account = secrets.email_user.as_deref().unwrap_or("lexicon@localhost");
        (Arc::new(ConsoleMailer), Envelope::from_config(&config.mail, account))
    } else {
        let (user, password) = secrets.mail_credentials()?;
        let mailer = SmtpMailer::new(&config.mail, user, password)?;
        (Arc::new(mailer), Envelope::from_config(&config.mail, user))
    };

    let pipeline = Pipeline::new(acquisition, mailer, envelope, config.acquisition.target_count)
        .with_run_timeout(config.schedule.run_timeout());

    if cli.once {
        let count = cli.count.unwrap_or(pipeline.target_count());
        let summary = pipeline
            .run_with_count(count)
            .await
            .context("Daily run failed")?;
        info!(
            "Run {} complete: {} words in {} requests",
            summary.run_id,
            summary.entries.len(),
            summary.stats.requests
        );
        return Ok(());
    }

    if cli.count.is_some() {
        warn!("--count only applies with --once; using target_count from config");
    }

    let daily = DailySchedule::new(&config.schedule.cron, &config.schedule.timezone)?;
    info!(
        "Scheduled daily run '{}' in {}",
        daily.expression(),
        daily.timezone().name()
    );

    schedule::run_scheduled(&pipeline, &daily, shutdown_signal()).await?;
    info!("Shutting down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
