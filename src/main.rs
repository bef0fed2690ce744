mod cli;
mod commands;
mod formatting;
mod settings;

use std::process::ExitCode;

use cli::Commands;
use commands::{run_extract, run_transfer, run_transform};
use etl_lib::logging;
use formatting::render_error;
use settings::{format_effective_config, load_config};
use tracing::debug;

#[tokio::main]
async fn main() -> ExitCode {
    run().await
}

async fn run() -> ExitCode {
    let args = cli::parse();
    let io = args.command.io().clone();

    let mut config = match load_config(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, io.format, io.output.as_deref()),
    };
    if args.verbose {
        config.logging.level = "debug".to_string();
    }
    logging::init(&config.logging);
    debug!("{}", format_effective_config(&config, args.config.as_deref()));

    match &args.command {
        Commands::Transform(io) => run_transform(io).await,
        Commands::Extract {
            io,
            nav_timeout,
            headed,
        } => run_extract(&config, io, *nav_timeout, *headed).await,
        Commands::Transfer(io) => run_transfer(&config, io).await,
    }
}
