mod args;
mod handlers;

use clap::Parser;
use std::error::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use args::*;
use handlers::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Grab the command line arguments
    let args = Args::parse();
    // Install the global collector, from RUST_LOG unless asked to be verbose
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    debug!("Logging started");
    match args.command {
        Command::Generate {
            variant,
            out,
            upstream,
        } => generate(variant, &out, upstream).await,
        Command::Check { path, part_nr } => check(&path, part_nr).await,
        Command::Dump { path, part_nr } => dump(&path, part_nr).await,
    }
}
