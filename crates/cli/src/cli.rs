use clap::Parser;

use crate::{
    commands::{run_command, Cli},
    logging::init_tracing,
};

/// Run the shelter CLI application.
///
/// Parses command-line arguments, initializes tracing and executes the
/// requested command against the configured collection.
pub async fn run() -> shelter::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.json, cli.verbose);

    run_command(cli).await
}
