//! Augmenting path search
//!
//! From an overfull root, bins are explored in order of accumulated cell
//! displacement. Crossing an edge is allowed only if the source bin can push
//! the required demand into the sink right now. The first bin reached with
//! enough spare capacity ends the search and the path is executed from the
//! sink back to the root, so every bin makes room before it receives cells.

use crate::bin::BinId;
use crate::error::{LegalizationInvariantError, Result};
use crate::flow::FlowState;
use dpflow_db::Network;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Identifies one path search; labels from older searches read as unset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchToken(u64);

/// Per-bin search labels, lazily invalidated by the token
#[derive(Debug, Clone, Default)]
pub struct SearchLabels {
    token: u64,
    stamp: Vec<u64>,
    dist: Vec<f64>,
    parent: Vec<Option<BinId>>,
    demand: Vec<f64>,
}

impl SearchLabels {
    /// Start a new search over `num_bins` bins
    pub fn begin(&mut self, num_bins: usize) -> SearchToken {
        if self.stamp.len() < num_bins {
            self.stamp.resize(num_bins, 0);
            self.dist.resize(num_bins, f64::INFINITY);
            self.parent.resize(num_bins, None);
            self.demand.resize(num_bins, 0.0);
        }
        self.token += 1;
        SearchToken(self.token)
    }

    fn is_set(&self, bin: BinId) -> bool {
        self.stamp[bin.index()] == self.token
    }

    pub fn dist(&self, bin: BinId) -> f64 {
        if self.is_set(bin) {
            self.dist[bin.index()]
        } else {
            f64::INFINITY
        }
    }

    pub fn parent(&self, bin: BinId) -> Option<BinId> {
        if self.is_set(bin) {
            self.parent[bin.index()]
        } else {
            None
        }
    }

    pub fn demand(&self, bin: BinId) -> f64 {
        if self.is_set(bin) {
            self.demand[bin.index()]
        } else {
            0.0
        }
    }

    pub fn set(&mut self, bin: BinId, dist: f64, parent: Option<BinId>, demand: f64) {
        let i = bin.index();
        self.stamp[i] = self.token;
        self.dist[i] = dist;
        self.parent[i] = parent;
        self.demand[i] = demand;
    }
}

/// Priority queue entry; the heap pops the lowest cost, then the highest id
#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    dist: f64,
    bin: BinId,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .dist
            .total_cmp(&self.dist)
            .then_with(|| self.bin.cmp(&other.bin))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<'a> FlowState<'a> {
    /// Find a bin that can absorb `demand` pushed out of `root`
    pub fn search_path(
        &mut self,
        network: &Network,
        root: BinId,
        demand: f64,
    ) -> Result<Option<BinId>> {
        let eps = self.config.epsilon;
        self.labels.begin(self.graph.num_bins());
        self.labels.set(root, 0.0, None, demand);

        let mut heap = BinaryHeap::new();
        heap.push(QueueEntry {
            dist: 0.0,
            bin: root,
        });

        while let Some(QueueEntry { dist, bin: v }) = heap.pop() {
            if dist > self.labels.dist(v) {
                continue;
            }

            let mut outflow = self.labels.demand(v);
            if v != root {
                let spare = self.graph.bin(v).spare();
                if spare >= outflow - eps {
                    return Ok(Some(v));
                }
                outflow = (outflow - spare).max(0.0);
            }
            if outflow <= eps {
                continue;
            }

            let edges = self.graph.edges(v).to_vec();
            for edge in edges {
                let u = edge.to;
                let plan = self.compute_flow(network, v, u, outflow)?;
                if plan.flow < outflow {
                    continue;
                }
                let next = dist + plan.displacement;
                if next < self.labels.dist(u) {
                    self.labels.set(u, next, Some(v), plan.flow);
                    heap.push(QueueEntry { dist: next, bin: u });
                }
            }
        }
        Ok(None)
    }

    /// Replay and carry out the flows along the path ending at `sink`
    pub fn execute_path(&mut self, network: &Network, sink: BinId) -> Result<()> {
        let eps = self.config.epsilon;
        let mut path = vec![sink];
        let mut current = sink;
        while let Some(parent) = self.labels.parent(current) {
            path.push(parent);
            current = parent;
        }

        let mut length = 0.0;
        for hop in path.windows(2) {
            let (u, v) = (hop[0], hop[1]);
            let demand = self.labels.demand(u);
            let plan = self.compute_flow(network, v, u, demand)?;
            if (plan.flow - demand).abs() > eps {
                return Err(LegalizationInvariantError::new(format!(
                    "replayed flow {} differs from planned {}",
                    plan.flow, demand
                ))
                .with_bin(v)
                .into());
            }
            let moved = self.move_flow(network, v, u, &plan, demand)?;
            if (moved - plan.flow).abs() > eps {
                return Err(LegalizationInvariantError::new(format!(
                    "moved {} instead of {}",
                    moved, plan.flow
                ))
                .with_bin(v)
                .into());
            }
            length += self
                .graph
                .edges(v)
                .iter()
                .find(|e| e.to == u)
                .map_or(0.0, |e| e.cost);
        }

        self.paths += 1;
        log::trace!(
            "Path of {} hops into {}, length {:.1}, displacement {:.1}",
            path.len() - 1,
            sink,
            length,
            self.labels.dist(sink)
        );
        Ok(())
    }

    /// One sweep over the overfull bins, pushing flow out of each until it
    /// fits or two searches fail. Returns whether any path was executed.
    pub fn setup_flow_paths(&mut self, network: &Network) -> Result<bool> {
        let eps = self.config.epsilon;
        let mut found = false;

        for root in self.graph.overfilled(eps) {
            let mut failures = 0;
            loop {
                let bin = self.graph.bin(root);
                if !bin.is_overfull(eps) {
                    break;
                }
                let excess = (bin.occupancy - bin.capacity()).max(0.0);
                let mut demand = excess.min(self.stats.max).floor();
                if demand <= 0.0 {
                    break;
                }
                if failures > 0 {
                    demand = self.stats.min.floor();
                }

                match self.search_path(network, root, demand)? {
                    Some(sink) => {
                        self.execute_path(network, sink)?;
                        found = true;
                    }
                    None => {
                        failures += 1;
                        if failures > 1 {
                            break;
                        }
                    }
                }
            }
        }
        Ok(found)
    }

    /// Push flow out of overfull bins, growing the displacement bound until
    /// nothing is overfull or the bound covers the chip.
    pub fn path_flow(&mut self, network: &Network) -> Result<()> {
        let eps = self.config.epsilon;
        let step = self.bin_width.max(self.row_height);
        self.max_displacement = self.config.displacement_factor * step;

        let mut pass = 0;
        while self.max_displacement < self.chip_extent {
            pass += 1;
            let overfilled = self.graph.count_overfilled(eps);
            log::info!(
                "Flow pass {}, displacement limit {:.1}, overfilled bins {}",
                pass,
                self.max_displacement,
                overfilled
            );
            self.moves.reset_counts();
            if overfilled == 0 {
                break;
            }

            let mut rounds = 0;
            while self.setup_flow_paths(network)? {
                rounds += 1;
                if rounds >= self.config.max_search_rounds {
                    log::warn!(
                        "Stopped path search after {} rounds at displacement limit {:.1}",
                        rounds,
                        self.max_displacement
                    );
                    break;
                }
            }

            self.max_displacement += self.config.displacement_increment * step;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::Assignment;
    use crate::config::FlowLegalizerConfig;
    use crate::flow::tests::make_state;
    use dpflow_db::CellId;

    #[test]
    fn test_queue_pops_lowest_cost_then_highest_id() {
        let mut heap = BinaryHeap::new();
        heap.push(QueueEntry { dist: 5.0, bin: BinId(1) });
        heap.push(QueueEntry { dist: 2.0, bin: BinId(7) });
        heap.push(QueueEntry { dist: 2.0, bin: BinId(3) });
        let order: Vec<u32> = std::iter::from_fn(|| heap.pop()).map(|e| e.bin.0).collect();
        assert_eq!(order, vec![7, 3, 1]);
    }

    #[test]
    fn test_labels_reset_between_searches() {
        let mut labels = SearchLabels::default();
        labels.begin(3);
        labels.set(BinId(1), 4.0, Some(BinId(0)), 10.0);
        assert_eq!(labels.dist(BinId(1)), 4.0);
        assert_eq!(labels.parent(BinId(1)), Some(BinId(0)));

        labels.begin(3);
        assert_eq!(labels.dist(BinId(1)), f64::INFINITY);
        assert_eq!(labels.parent(BinId(1)), None);
        assert_eq!(labels.demand(BinId(1)), 0.0);
    }

    #[test]
    fn test_search_finds_neighbour_with_room() {
        let config = FlowLegalizerConfig::default();
        // 60 units in the left bin of capacity 50. The cell at 48 shifts by
        // 7 into the right bin, cheaper than a 10 move up a row.
        let (mut state, network) =
            make_state(&config, &[(10.0, 20.0), (30.0, 30.0), (48.0, 10.0)]);
        assert!(state.graph.bin(BinId(0)).is_overfull(config.epsilon));

        let sink = state.search_path(&network, BinId(0), 10.0).unwrap();
        assert_eq!(sink, Some(BinId(1)));
        assert_eq!(state.labels.dist(BinId(1)), 7.0);
        state.execute_path(&network, BinId(1)).unwrap();
        assert_eq!(state.graph.bin(BinId(0)).occupancy, 50.0);
        assert_eq!(state.graph.bin(BinId(1)).occupancy, 10.0);
        assert_eq!(state.map.get(CellId(2)), Some(Assignment::Whole(BinId(1))));
        assert_eq!(state.paths, 1);
    }

    #[test]
    fn test_setup_flow_paths_clears_overflow() {
        let config = FlowLegalizerConfig::default();
        let (mut state, network) =
            make_state(&config, &[(5.0, 20.0), (20.0, 20.0), (30.0, 20.0), (45.0, 20.0)]);
        assert!(state.setup_flow_paths(&network).unwrap());
        assert_eq!(state.graph.count_overfilled(config.epsilon), 0);

        let total: f64 = state.graph.alive_bins().map(|b| b.occupancy).sum();
        assert_eq!(total, 80.0);
        assert!(!state.setup_flow_paths(&network).unwrap());
    }

    #[test]
    fn test_path_flow_uses_other_row_when_row_is_full() {
        let config = FlowLegalizerConfig::default();
        // Both bins of row 0 are full, so overflow has to go up a row.
        let (mut state, network) = make_state(
            &config,
            &[(10.0, 25.0), (20.0, 25.0), (30.0, 20.0), (60.0, 25.0), (80.0, 25.0)],
        );
        state.path_flow(&network).unwrap();

        assert_eq!(state.graph.count_overfilled(config.epsilon), 0);
        assert_eq!(state.graph.bin(BinId(2)).occupancy, 20.0);
        let up: Vec<CellId> = state.map.cells_in_bin(BinId(2)).to_vec();
        assert_eq!(up.len(), 1);
        assert_eq!(state.map.get(up[0]), Some(Assignment::Whole(BinId(2))));
    }
}
