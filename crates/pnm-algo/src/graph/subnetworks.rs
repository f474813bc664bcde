//! Connected-component detection over the bus graph.
//!
//! Two buses are adjacent when an in-service branch connects them. Components
//! are found with a disjoint-set forest and reported as a map from a
//! representative bus position to the set of bus positions in that island.
//! Before reference assignment the representative is the lowest position of
//! the island; afterwards it is the island's reference bus.

use crate::config::ReferenceBusPolicy;
use crate::error::SensitivityError;
use petgraph::unionfind::UnionFind;
use pnm_core::BusId;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Subnetworks {
    islands: BTreeMap<usize, BTreeSet<usize>>,
}

impl Subnetworks {
    /// Partition `num_buses` positions using the given `(from, to)` edges.
    pub fn detect<I>(num_buses: usize, edges: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let mut forest = UnionFind::<usize>::new(num_buses);
        for (a, b) in edges {
            forest.union(a, b);
        }

        let mut by_root: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        for pos in 0..num_buses {
            by_root.entry(forest.find(pos)).or_default().insert(pos);
        }

        let islands: BTreeMap<usize, BTreeSet<usize>> = by_root
            .into_values()
            .filter_map(|members| members.first().copied().map(|low| (low, members)))
            .collect();

        debug!(num_buses, islands = islands.len(), "subnetworks detected");
        Self { islands }
    }

    /// Build from an explicit representative → members map.
    pub fn from_map(islands: BTreeMap<usize, BTreeSet<usize>>) -> Self {
        Self { islands }
    }

    /// Re-key each island by its reference bus.
    ///
    /// `refs` are bus positions flagged as reference. Returns the re-keyed
    /// partition together with the full (sorted) reference set, which includes
    /// any bus chosen under [`ReferenceBusPolicy::AutoAssign`].
    pub fn assign_reference_buses(
        &self,
        refs: &[usize],
        policy: ReferenceBusPolicy,
        labels: &[BusId],
    ) -> Result<(Subnetworks, Vec<usize>), SensitivityError> {
        let label = |pos: usize| {
            labels
                .get(pos)
                .map(|id| id.to_string())
                .unwrap_or_else(|| format!("#{pos}"))
        };

        let mut keyed = BTreeMap::new();
        let mut assigned = Vec::with_capacity(self.islands.len());

        for (&low, members) in &self.islands {
            let island_refs: Vec<usize> = refs
                .iter()
                .copied()
                .filter(|r| members.contains(r))
                .collect();

            let reference = match island_refs.as_slice() {
                [single] => *single,
                [] => match policy {
                    ReferenceBusPolicy::Strict => {
                        return Err(SensitivityError::Topology(format!(
                            "island containing bus {} ({} buses) has no reference bus",
                            label(low),
                            members.len()
                        )));
                    }
                    ReferenceBusPolicy::AutoAssign => {
                        warn!(
                            bus = %label(low),
                            island_size = members.len(),
                            "island has no reference bus; assigning its first bus"
                        );
                        low
                    }
                },
                many => {
                    let names: Vec<String> = many.iter().map(|&p| label(p)).collect();
                    return Err(SensitivityError::Topology(format!(
                        "island has {} reference buses ({}); exactly one is required",
                        many.len(),
                        names.join(", ")
                    )));
                }
            };

            assigned.push(reference);
            keyed.insert(reference, members.clone());
        }

        assigned.sort_unstable();
        Ok((Subnetworks { islands: keyed }, assigned))
    }

    pub fn len(&self) -> usize {
        self.islands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.islands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&usize, &BTreeSet<usize>)> + '_ {
        self.islands.iter()
    }

    pub fn as_map(&self) -> &BTreeMap<usize, BTreeSet<usize>> {
        &self.islands
    }

    /// Representative of the island containing `pos`.
    pub fn island_of(&self, pos: usize) -> Option<usize> {
        self.islands
            .iter()
            .find(|(_, members)| members.contains(&pos))
            .map(|(&rep, _)| rep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize) -> Vec<BusId> {
        (1..=n).map(BusId::new).collect()
    }

    #[test]
    fn test_two_islands() {
        // 0-1-2 and 3-4
        let subs = Subnetworks::detect(5, [(0, 1), (1, 2), (3, 4)]);
        assert_eq!(subs.len(), 2);
        assert_eq!(subs.island_of(2), Some(0));
        assert_eq!(subs.island_of(4), Some(3));
        assert_eq!(subs.as_map()[&3].len(), 2);
    }

    #[test]
    fn test_isolated_bus_is_its_own_island() {
        let subs = Subnetworks::detect(3, [(0, 1)]);
        assert_eq!(subs.len(), 2);
        assert_eq!(subs.island_of(2), Some(2));
    }

    #[test]
    fn test_assign_one_reference_per_island() {
        let subs = Subnetworks::detect(5, [(0, 1), (1, 2), (3, 4)]);
        let (keyed, refs) = subs
            .assign_reference_buses(&[2, 4], ReferenceBusPolicy::Strict, &labels(5))
            .unwrap();
        assert_eq!(refs, vec![2, 4]);
        assert_eq!(keyed.island_of(0), Some(2));
        assert_eq!(keyed.island_of(3), Some(4));
    }

    #[test]
    fn test_missing_reference_strict_vs_auto() {
        let subs = Subnetworks::detect(5, [(0, 1), (1, 2), (3, 4)]);
        let err = subs
            .assign_reference_buses(&[1], ReferenceBusPolicy::Strict, &labels(5))
            .unwrap_err();
        assert!(matches!(err, SensitivityError::Topology(_)));

        let (_, refs) = subs
            .assign_reference_buses(&[1], ReferenceBusPolicy::AutoAssign, &labels(5))
            .unwrap();
        assert_eq!(refs, vec![1, 3]);
    }

    #[test]
    fn test_two_references_in_one_island_rejected() {
        let subs = Subnetworks::detect(3, [(0, 1), (1, 2)]);
        for policy in [ReferenceBusPolicy::Strict, ReferenceBusPolicy::AutoAssign] {
            let err = subs
                .assign_reference_buses(&[0, 2], policy, &labels(3))
                .unwrap_err();
            assert!(err.to_string().contains("2 reference buses"));
        }
    }
}
