use clap::{Args, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pnm", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the PTDF matrix of a topology
    Ptdf(MatrixArgs),
    /// Build the LODF matrix of a topology
    Lodf(MatrixArgs),
    /// List the connected islands of a topology and their reference buses
    Islands {
        #[arg(value_hint = ValueHint::FilePath)]
        topology: PathBuf,
        /// Also print the island of every bus
        #[arg(long)]
        emit: bool,
    },
    /// Query a saved PTDF/LODF matrix
    Inspect {
        #[arg(value_hint = ValueHint::FilePath)]
        matrix: PathBuf,
        /// Row label (bus number for PTDF, monitored branch for LODF)
        #[arg(long)]
        row: Option<String>,
        /// Column label (branch for PTDF, outaged branch for LODF)
        #[arg(long)]
        col: Option<String>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct MatrixArgs {
    /// Topology JSON file
    #[arg(value_hint = ValueHint::FilePath)]
    pub topology: PathBuf,

    /// TOML configuration; flags below override its values
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Linear solver (sparse-direct, dense, alt-direct)
    #[arg(long)]
    pub solver: Option<String>,

    /// Comma-separated distributed-slack weights, one per bus
    #[arg(long)]
    pub slack_weights: Option<String>,

    /// Sparsification tolerance
    #[arg(long)]
    pub tol: Option<f64>,

    /// Assign a reference bus to islands that lack one
    #[arg(long)]
    pub auto_reference: bool,

    /// Write the matrix record here instead of printing a summary
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub out: Option<PathBuf>,
}
