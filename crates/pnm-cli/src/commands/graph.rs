use std::path::Path;

use anyhow::Result;
use pnm_algo::{BusTopology, ReferenceBusPolicy};
use pnm_core::{graph_utils, BusId};

/// Print the islands matrix construction would see, and the reference buses
/// `--auto-reference` would pick. A failed reference assignment is reported,
/// not returned, since that is usually what the user is diagnosing.
pub fn handle_islands(topology: &Path, emit: bool) -> Result<()> {
    let network = pnm_io::load_network(topology)?;
    let stats = graph_utils::graph_stats(&network);
    println!(
        "{} buses, {} branches, degree {}..{} (avg {:.2}), density {:.4}",
        stats.node_count,
        stats.edge_count,
        stats.min_degree,
        stats.max_degree,
        stats.avg_degree,
        stats.density
    );

    let scan = BusTopology::from_network(&network)?;
    let labels = scan.bus_axis().labels();

    println!("Islands in {}:", topology.display());
    for (island, (_, members)) in scan.islands().iter().enumerate() {
        let flagged = join_labels(
            labels,
            members
                .iter()
                .copied()
                .filter(|&pos| network.buses[pos].is_reference()),
        );
        let flagged = if flagged.is_empty() {
            "no flagged reference".to_string()
        } else {
            format!("flagged reference {flagged}")
        };
        println!(
            "Island {island}: {} bus(es) [{}], {flagged}",
            members.len(),
            join_labels(labels, members.iter().copied())
        );
    }

    match scan.assign_reference_buses(ReferenceBusPolicy::AutoAssign) {
        Ok((_, refs)) => println!("Reference buses: {}", join_labels(labels, refs)),
        Err(e) => println!("Reference assignment failed: {e}"),
    }

    if emit {
        println!("\nBus → Island assignments:");
        let islands: Vec<usize> = scan.islands().iter().map(|(&low, _)| low).collect();
        for (pos, bus) in network.buses.iter().enumerate() {
            let island = scan
                .islands()
                .island_of(pos)
                .and_then(|low| islands.iter().position(|&l| l == low));
            if let Some(island) = island {
                let bus = bus.id.to_string();
                println!("  idx {pos:>3}: bus {bus:<8} -> island {island}");
            }
        }
    }
    Ok(())
}

fn join_labels(labels: &[BusId], positions: impl IntoIterator<Item = usize>) -> String {
    positions
        .into_iter()
        .map(|pos| labels[pos].to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
