use std::path::Path;

use anyhow::{anyhow, bail, Result};
use pnm_core::BusId;
use pnm_io::MatrixKind;

fn fmt_values(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format!("{v:.6}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn handle(matrix: &Path, row: Option<&str>, col: Option<&str>) -> Result<()> {
    let record = pnm_io::load_record(matrix)?;
    println!(
        "{} {}x{} (tolerance {:e})",
        record.kind.to_string().to_uppercase(),
        record.rows,
        record.cols,
        record.tolerance
    );

    match record.kind {
        MatrixKind::Ptdf => {
            let ptdf = record.into_ptdf()?;
            let bus = row
                .map(|r| {
                    r.parse::<usize>()
                        .map(BusId::new)
                        .map_err(|_| anyhow!("PTDF rows are bus numbers, got '{r}'"))
                })
                .transpose()?;
            match (bus, col) {
                (Some(bus), Some(branch)) => {
                    let v = ptdf
                        .get(branch, bus)
                        .ok_or_else(|| anyhow!("no entry for branch '{branch}', bus {bus}"))?;
                    println!("{v:.6}");
                }
                (Some(bus), None) => {
                    let values = ptdf
                        .bus_column(bus)
                        .ok_or_else(|| anyhow!("unknown bus {bus}"))?;
                    println!("{}", fmt_values(&values));
                }
                (None, Some(branch)) => {
                    let values = ptdf
                        .branch_row(branch)
                        .ok_or_else(|| anyhow!("unknown branch '{branch}'"))?;
                    println!("{}", fmt_values(&values));
                }
                (None, None) => {
                    let refs: Vec<String> =
                        ptdf.reference_buses().iter().map(|b| b.to_string()).collect();
                    println!("Reference buses: {}", refs.join(", "));
                    println!("Islands: {}", ptdf.subnetworks().len());
                }
            }
        }
        MatrixKind::Lodf => {
            let lodf = record.into_lodf()?;
            match (row, col) {
                (Some(monitored), Some(outaged)) => {
                    let v = lodf.get(monitored, outaged).ok_or_else(|| {
                        anyhow!("no entry for monitored '{monitored}', outaged '{outaged}'")
                    })?;
                    println!("{v:.6}");
                }
                (Some(monitored), None) => match lodf.monitored_row(monitored) {
                    Some(values) => println!("{}", fmt_values(&values)),
                    None => bail!("unknown branch '{monitored}'"),
                },
                (None, Some(outaged)) => match lodf.outage_column(outaged) {
                    Some(values) => println!("{}", fmt_values(&values)),
                    None => bail!("unknown branch '{outaged}'"),
                },
                (None, None) => {
                    println!("Branches: {}", lodf.branch_axis().labels().join(", "));
                }
            }
        }
    }
    Ok(())
}
