//! `evsync` - watch evidence processing status from the command line

mod commands;
mod config;
mod logging;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use config::EvsyncConfig;
use evsync_http::ApiConfig;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "evsync", version, about = "Evidence processing status synchronizer")]
struct Cli {
    /// Config file (TOML)
    #[arg(long, short, global = true, env = "EVSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// API base URL, overrides the config file
    #[arg(long, global = true, env = "EVSYNC_BASE_URL")]
    base_url: Option<String>,

    /// Bearer token, overrides the config file
    #[arg(long, global = true, env = "EVSYNC_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch once and print the records
    Fetch {
        #[command(flatten)]
        target: Target,

        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Poll until every record settles, printing status changes
    Watch {
        #[command(flatten)]
        target: Target,

        /// Poll interval in milliseconds, overrides the config file
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Give up after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

/// What to poll
#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
struct Target {
    /// Case id; polls the case's evidence list
    #[arg(long)]
    case: Option<String>,

    /// Evidence id; polls a single item
    #[arg(long)]
    item: Option<String>,
}

impl Cli {
    fn resolve_config(&self) -> Result<EvsyncConfig> {
        let mut config = match (&self.config, &self.base_url) {
            (Some(path), _) => EvsyncConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            (None, Some(base_url)) => EvsyncConfig::new(ApiConfig::new(base_url.clone())),
            (None, None) => bail!("either --config or --base-url is required"),
        };

        if let Some(base_url) = &self.base_url {
            config.api.base_url.clone_from(base_url);
        }
        if let Some(token) = &self.api_token {
            config.api.api_token = Some(token.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_json);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = cli.resolve_config()?;

    match cli.command {
        Command::Fetch { target, json } => commands::fetch(&config, &target.into(), json).await,
        Command::Watch {
            target,
            interval_ms,
            timeout_secs,
        } => {
            if let Some(ms) = interval_ms {
                config.sync.poll_interval_ms = ms;
                config.validate()?;
            }
            commands::watch(&config, &target.into(), timeout_secs).await
        }
    }
}

impl From<Target> for commands::Target {
    fn from(target: Target) -> Self {
        match (target.case, target.item) {
            (_, Some(item)) => Self::Item(item),
            (Some(case), None) => Self::Case(case),
            (None, None) => Self::Case(String::new()),
        }
    }
}
