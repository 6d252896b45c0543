//! Argument definitions for the `streamds` binary.

use clap::{Args, Parser, Subcommand};

/// Query the data streams of the KM3NeT database.
#[derive(Debug, Parser)]
#[command(name = "streamds", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Database base URL (overrides the config file).
    #[arg(long, global = true, env = "KM3NET_DB_URL")]
    pub url: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the streams the database offers.
    List,

    /// Show the documentation of one stream.
    Info {
        /// Stream name (e.g. `detectors`).
        stream: String,
    },

    /// Fetch stream data and print it.
    Get(GetArgs),
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Stream name (e.g. `runs`).
    pub stream: String,

    /// Selectors as `key=value` pairs, sent in the given order.
    pub selectors: Vec<String>,

    /// Output format requested from the server.
    #[arg(short, long, default_value = "txt")]
    pub format: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn get_takes_selectors_after_the_stream() {
        let cli =
            Cli::try_parse_from(["streamds", "get", "runs", "detid=49", "minrun=8000"]).unwrap();
        match cli.command {
            Command::Get(args) => {
                assert_eq!(args.stream, "runs");
                assert_eq!(args.selectors, ["detid=49", "minrun=8000"]);
                assert_eq!(args.format, "txt");
            }
            other => panic!("expected Get, got {other:?}"),
        }
    }
}
