use anyhow::Result;
use clap::Parser;

mod cli;
mod config;
mod http;
mod logging;
mod token;
mod workflow;

fn main() -> Result<()> {
    let args = cli::RootArgs::parse();
    logging::init(args.verbose);
    workflow::run(&args)
}
