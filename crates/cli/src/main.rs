//! irs - iRODS storage client
//!
//! Drives the irods-storage adapter from the command line: existence and
//! metadata checks, transfers, removal and resource capacity.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use irods_storage_cli::commands::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // --debug wins over RUST_LOG; otherwise only warnings are shown
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let exit_code = commands::execute(cli).await;

    std::process::exit(exit_code.as_i32());
}
