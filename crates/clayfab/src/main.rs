use std::process::ExitCode;

use clap::Parser;
use tracing::error;

mod cli;

use cli::exit_codes::{codes, map_error};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    match cli::commands::run(cli).await {
        Ok(()) => ExitCode::from(codes::SUCCESS),
        Err(err) => {
            error!("{:#}", err);
            eprintln!("Error: {:#}", err);
            ExitCode::from(map_error(&err))
        }
    }
}
