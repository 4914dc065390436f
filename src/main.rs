mod app;
mod cli;
mod db;
mod logging;
mod paths;
mod player;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    logging::init(&cli.log_level)?;
    app::run(cli)
}
