mod cli;
mod commands;
mod config;
mod error;

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use km3db_api::{DbClient, SessionConfig, TransportConfig};
use km3db_core::StreamDs;

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let cfg = config::load_config_or_default();

    let url_str = cli.global.url.clone().unwrap_or(cfg.url);
    let url: url::Url = url_str
        .parse()
        .map_err(|_| CliError::BadUrl { url: url_str.clone() })?;

    let mut transport = TransportConfig::default();
    if cfg.timeout > 0 {
        transport.timeout = Some(Duration::from_secs(cfg.timeout));
    }

    let client = DbClient::with_base_url(url, &transport, SessionConfig::default())
        .map_err(|e| CliError::Core(e.into()))?;

    tracing::debug!(command = ?cli.command, "dispatching command");
    let sds = StreamDs::new(client).await?;
    commands::dispatch(cli.command, &sds).await
}
