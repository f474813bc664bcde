use clap::Parser;
use pnm_cli::{Cli, Commands};
use tracing::error;
use tracing_subscriber::FmtSubscriber;

mod commands;

use crate::commands::{graph, inspect, sensitivity};

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let (name, result) = match &cli.command {
        Commands::Ptdf(args) => ("ptdf", sensitivity::handle_ptdf(args)),
        Commands::Lodf(args) => ("lodf", sensitivity::handle_lodf(args)),
        Commands::Islands { topology, emit } => ("islands", graph::handle_islands(topology, *emit)),
        Commands::Inspect { matrix, row, col } => (
            "inspect",
            inspect::handle(matrix, row.as_deref(), col.as_deref()),
        ),
    };

    if let Err(e) = result {
        error!("{name} failed: {e:#}");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
