//! stashQ CLI - offline administration of a queue database.

use anyhow::Result;
use clap::Parser;

use stashq::cli::{commands, Cli};
use stashq::telemetry;

fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.log_format);

    let config = cli.config();
    commands::execute(cli.command, &config)
}
