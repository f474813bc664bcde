use std::io::{self, Write};
use std::time::Instant;

use anyhow::Result;
use pnm_algo::{LodfMatrix, PtdfMatrix};
use pnm_cli::MatrixArgs;
use tabwriter::TabWriter;
use tracing::info;

use crate::commands::util::build_config;

pub fn handle_ptdf(args: &MatrixArgs) -> Result<()> {
    let config = build_config(args)?;
    let network = pnm_io::load_network(&args.topology)?;
    let start = Instant::now();
    let ptdf = PtdfMatrix::from_network(&network, &config)?;
    info!(
        buses = ptdf.num_buses(),
        branches = ptdf.num_branches(),
        solver = %config.linear_solver,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "PTDF computed"
    );

    if let Some(out) = &args.out {
        pnm_io::save_ptdf(&ptdf, out)?;
        println!("PTDF written to {}", out.display());
        return Ok(());
    }

    let mut writer = TabWriter::new(io::stdout());
    write!(writer, "BRANCH")?;
    for bus in ptdf.bus_axis().labels() {
        write!(writer, "\t{bus}")?;
    }
    writeln!(writer)?;
    for branch in ptdf.branch_axis().labels() {
        write!(writer, "{branch}")?;
        for v in ptdf.branch_row(branch).unwrap_or_default() {
            write!(writer, "\t{v:.6}")?;
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn handle_lodf(args: &MatrixArgs) -> Result<()> {
    let config = build_config(args)?;
    let network = pnm_io::load_network(&args.topology)?;
    let start = Instant::now();
    let lodf = LodfMatrix::from_network(&network, &config)?;
    info!(
        branches = lodf.num_branches(),
        solver = %config.linear_solver,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "LODF computed"
    );

    if let Some(out) = &args.out {
        pnm_io::save_lodf(&lodf, out)?;
        println!("LODF written to {}", out.display());
        return Ok(());
    }

    let mut writer = TabWriter::new(io::stdout());
    write!(writer, "MONITORED\\OUTAGED")?;
    for outaged in lodf.branch_axis().labels() {
        write!(writer, "\t{outaged}")?;
    }
    writeln!(writer)?;
    for monitored in lodf.branch_axis().labels() {
        write!(writer, "{monitored}")?;
        for v in lodf.monitored_row(monitored).unwrap_or_default() {
            write!(writer, "\t{v:.6}")?;
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}
