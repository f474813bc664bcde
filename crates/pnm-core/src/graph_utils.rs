use crate::Network;
use petgraph::algo::connected_components;

/// Summary statistics for a topology (density/degree/connected components).
#[derive(Debug)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub connected_components: usize,
    pub min_degree: usize,
    pub avg_degree: f64,
    pub max_degree: usize,
    pub density: f64,
}

/// Calculates graph-level statistics such as density, degree distribution, and component counts.
pub fn graph_stats(network: &Network) -> GraphStats {
    let graph = network.graph();
    let node_count = graph.node_count();
    let edge_count = graph.edge_count();
    let degrees: Vec<usize> = graph
        .node_indices()
        .map(|node| graph.neighbors(node).count())
        .collect();
    let min_degree = degrees.iter().copied().min().unwrap_or(0);
    let max_degree = degrees.iter().copied().max().unwrap_or(0);
    let avg_degree = if node_count == 0 {
        0.0
    } else {
        degrees.iter().sum::<usize>() as f64 / node_count as f64
    };
    let density = if node_count < 2 {
        0.0
    } else {
        2.0 * edge_count as f64 / (node_count as f64 * (node_count as f64 - 1.0))
    };
    GraphStats {
        node_count,
        edge_count,
        connected_components: connected_components(&graph),
        min_degree,
        avg_degree,
        max_degree,
        density,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Branch, BranchId, Bus, BusId, BusKind};

    fn two_islands() -> Network {
        let mut network = Network::new();
        for id in 1..=4 {
            let kind = if id == 1 { BusKind::Ref } else { BusKind::Pq };
            network.add_bus(Bus::new(BusId::new(id), format!("Bus{id}")).with_kind(kind));
        }
        network.add_branch(Branch::new(
            BranchId::new(1),
            "L12".into(),
            BusId::new(1),
            BusId::new(2),
            0.0,
            0.1,
        ));
        network.add_branch(Branch::new(
            BranchId::new(2),
            "L34".into(),
            BusId::new(3),
            BusId::new(4),
            0.0,
            0.1,
        ));
        network
    }

    #[test]
    fn test_graph_stats() {
        let stats = graph_stats(&two_islands());
        assert_eq!(stats.node_count, 4);
        assert_eq!(stats.edge_count, 2);
        assert_eq!(stats.connected_components, 2);
        assert_eq!(stats.max_degree, 1);
    }
}
