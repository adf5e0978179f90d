use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gator::commands::{AppState, Command};
use gator::config::Config;
use gator::db::Database;
use gator::fetcher::Fetcher;
use gator::handlers::{default_commands, run_without_state};
use gator::{Error, Result};

#[derive(Debug, Parser)]
#[command(name = "gator", version, about = "Personal RSS feed aggregator")]
struct Cli {
    /// Path to the config file (defaults to ~/.config/gator.toml)
    #[arg(long, env = "GATOR_CONFIG")]
    config: Option<PathBuf>,

    /// Command to run; `help` lists them
    command: Option<String>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Logs go to stderr so command output on stdout stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let name = cli.command.ok_or(Error::NoCommand)?;
    let cmd = Command::new(name, cli.args);

    let commands = default_commands();
    if run_without_state(&commands, &cmd)? {
        return Ok(());
    }

    // Load configuration
    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let config = Config::load(&config_path)?;
    debug!(path = %config_path.display(), "loaded configuration");

    // Initialize database
    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| config.db_url.clone());
    let db = Database::new(&database_url).await?;
    db.initialize().await?;

    let timeout = Duration::from_secs(config.aggregator.request_timeout_secs);
    let fetcher = Fetcher::new(timeout).map_err(|e| Error::Config(e.to_string()))?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            signal_token.cancel();
        }
    });

    let mut state = AppState {
        config,
        db,
        fetcher,
        shutdown,
    };

    commands.execute(&mut state, &cmd).await
}
