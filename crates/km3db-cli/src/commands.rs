//! Subcommand handlers for the `streamds` binary.

use tabled::settings::Style;
use tabled::{Table, Tabled};

use km3db_core::StreamDs;

use crate::cli::{Command, GetArgs};
use crate::error::CliError;

#[derive(Tabled)]
struct StreamRow<'a> {
    #[tabled(rename = "STREAM")]
    name: &'a str,
    #[tabled(rename = "DESCRIPTION")]
    description: &'a str,
}

pub async fn dispatch(command: Command, sds: &StreamDs) -> Result<(), CliError> {
    match command {
        Command::List => {
            list(sds);
            Ok(())
        }
        Command::Info { stream } => info(sds, &stream),
        Command::Get(args) => get(sds, args).await,
    }
}

fn list(sds: &StreamDs) {
    let rows = sds.streams().map(|stream| StreamRow {
        name: &stream.name,
        description: &stream.description,
    });
    let mut table = Table::new(rows);
    table.with(Style::blank());
    println!("{table}");
}

fn info(sds: &StreamDs, stream: &str) -> Result<(), CliError> {
    let handle = sds.stream(stream).map_err(|_| CliError::UnknownStream {
        stream: stream.to_owned(),
    })?;
    print!("{}", handle.descriptor().help());
    Ok(())
}

async fn get(sds: &StreamDs, args: GetArgs) -> Result<(), CliError> {
    let handle = sds
        .stream(&args.stream)
        .map_err(|_| CliError::UnknownStream {
            stream: args.stream.clone(),
        })?;

    let mut query = handle.query().format(args.format.as_str());
    for raw in &args.selectors {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| CliError::BadSelector { raw: raw.clone() })?;
        query = query.selector(key, value);
    }

    match query.send().await? {
        Some(result) => {
            print!("{}", result.as_text().unwrap_or_default());
            Ok(())
        }
        None => Err(CliError::NoData),
    }
}
