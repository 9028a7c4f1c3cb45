//! Cell flow between two bins
//!
//! `compute_flow` decides which cells of a source bin would move to a sink
//! bin to carry a given demand, without changing anything. `move_flow`
//! carries out exactly such a plan. Path search calls the first for every
//! edge it explores and replays it before calling the second.
//!
//! Cells may only be split between adjacent bins of one segment; across rows
//! or segments whole cells move and the flow may overshoot the demand.

use crate::assignment::{Assignment, CellBinMap};
use crate::bin::{BinGraph, BinId};
use crate::config::FlowLegalizerConfig;
use crate::error::{LegalizationInvariantError, Result};
use crate::search::SearchLabels;
use crate::stats::CellWidthStats;
use dpflow_db::{Cell, CellId, Network};

/// Stamp identifying one flow computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveEpoch(u64);

/// Per-cell move budget and the cells already listed in the current epoch
#[derive(Debug, Clone)]
pub struct MoveTracker {
    epoch: u64,
    listed: Vec<u64>,
    counts: Vec<u32>,
    limit: u32,
    total: usize,
}

impl MoveTracker {
    pub fn new(num_cells: usize, limit: u32) -> Self {
        Self {
            epoch: 0,
            listed: vec![0; num_cells],
            counts: vec![0; num_cells],
            limit,
            total: 0,
        }
    }

    pub fn next_epoch(&mut self) -> MoveEpoch {
        self.epoch += 1;
        MoveEpoch(self.epoch)
    }

    pub fn is_listed(&self, cell: CellId, epoch: MoveEpoch) -> bool {
        self.listed[cell.index()] == epoch.0
    }

    pub fn list(&mut self, cell: CellId, epoch: MoveEpoch) {
        self.listed[cell.index()] = epoch.0;
    }

    pub fn can_move(&self, cell: CellId) -> bool {
        self.counts[cell.index()] < self.limit
    }

    pub fn record_move(&mut self, cell: CellId) {
        self.counts[cell.index()] += 1;
        self.total += 1;
    }

    /// Forget per-cell counts; the total is kept
    pub fn reset_counts(&mut self) {
        self.counts.fill(0);
    }

    /// Whole-cell moves since creation
    pub fn total(&self) -> usize {
        self.total
    }
}

/// Cells chosen to carry flow from one bin to another
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowCandidates {
    /// A cell already split between the two bins comes first
    pub cells: Vec<CellId>,
    pub flow: f64,
    /// Sum of the cells' displacement if placed in the sink
    pub displacement: f64,
}

/// Displacement of `cell` from its original position if placed in `snk`
pub(crate) fn displacement_to(cell: &Cell, min_x: f64, max_x: f64, center_y: f64) -> f64 {
    let xx = cell
        .orig_x
        .min(max_x - 0.5 * cell.width)
        .max(min_x + 0.5 * cell.width);
    (xx - cell.orig_x).abs() + (center_y - cell.orig_y).abs()
}

/// Mutable state of one region's flow legalization
#[derive(Debug)]
pub struct FlowState<'a> {
    pub(crate) config: &'a FlowLegalizerConfig,
    pub(crate) stats: CellWidthStats,
    pub(crate) graph: BinGraph,
    pub(crate) map: CellBinMap,
    pub(crate) moves: MoveTracker,
    pub(crate) labels: SearchLabels,
    pub(crate) bin_width: f64,
    pub(crate) row_height: f64,
    pub(crate) xmin: f64,
    pub(crate) xmax: f64,
    /// Larger of chip width and height
    pub(crate) chip_extent: f64,
    pub(crate) max_displacement: f64,
    /// Augmenting paths executed
    pub(crate) paths: usize,
}

impl<'a> FlowState<'a> {
    fn eps(&self) -> f64 {
        self.config.epsilon
    }

    /// Plan moving `demand` units of cell area from `src` into `snk`
    pub fn compute_flow(
        &mut self,
        network: &Network,
        src: BinId,
        snk: BinId,
        demand: f64,
    ) -> Result<FlowCandidates> {
        let eps = self.eps();
        let splittable = self.graph.adjacent(src, snk, eps);
        let epoch = self.moves.next_epoch();
        let target = self.graph.bin(snk);
        let (min_x, max_x, center_y) = (target.min_x, target.max_x, target.center_y());

        let mut flow = 0.0;
        let mut fractional: Option<(CellId, f64)> = None;
        let mut sorted: Vec<(CellId, f64, f64)> = Vec::new();

        if splittable {
            for &id in self.map.cells_in_bin(src) {
                if self.moves.is_listed(id, epoch) {
                    continue;
                }
                let Some((area_src, _)) = self.map.get(id).and_then(|a| a.split_between(src, snk))
                else {
                    continue;
                };
                if fractional.is_some() {
                    return Err(LegalizationInvariantError::new(
                        "more than one cell split between two bins",
                    )
                    .with_bin(src)
                    .with_cell(id)
                    .into());
                }
                self.moves.list(id, epoch);
                let cell = network.cell(id)?;
                fractional = Some((id, displacement_to(cell, min_x, max_x, center_y)));
                flow += area_src.min(demand);
            }
        }

        if flow < demand {
            for &id in self.map.cells_in_bin(src) {
                if self.moves.is_listed(id, epoch) || !self.moves.can_move(id) {
                    continue;
                }
                let cell = network.cell(id)?;
                let disp = displacement_to(cell, min_x, max_x, center_y);
                if disp > self.max_displacement {
                    continue;
                }
                if self.map.get(id).map_or(false, |a| a.is_fractional()) {
                    continue;
                }
                sorted.push((id, disp, cell.width));
                self.moves.list(id, epoch);
            }
        }

        sorted.sort_by(|a, b| {
            a.1.total_cmp(&b.1)
                .then_with(|| a.2.total_cmp(&b.2))
                .then_with(|| a.0.cmp(&b.0))
        });

        let mut keep = sorted.len();
        if flow < demand {
            for (i, &(_, _, width)) in sorted.iter().enumerate() {
                flow = if splittable {
                    (flow + width).min(demand)
                } else {
                    flow + width
                };
                if flow >= demand {
                    keep = i + 1;
                    break;
                }
            }
        } else {
            keep = 0;
        }
        sorted.truncate(keep);

        let mut candidates = FlowCandidates {
            cells: Vec::with_capacity(sorted.len() + 1),
            flow,
            displacement: 0.0,
        };
        if let Some((id, disp)) = fractional {
            candidates.cells.push(id);
            candidates.displacement += disp;
        }
        for (id, disp, _) in sorted {
            candidates.cells.push(id);
            candidates.displacement += disp;
        }
        Ok(candidates)
    }

    /// Move the planned cells from `src` into `snk`. Returns the area moved.
    pub fn move_flow(
        &mut self,
        network: &Network,
        src: BinId,
        snk: BinId,
        candidates: &FlowCandidates,
        demand: f64,
    ) -> Result<f64> {
        let eps = self.eps();
        let splittable = self.graph.adjacent(src, snk, eps);
        let last = candidates.cells.len().saturating_sub(1);
        let invariant = |msg: &str, cell: CellId| {
            LegalizationInvariantError::new(msg)
                .with_bin(src)
                .with_cell(cell)
        };

        let mut flow = 0.0;
        for (i, &id) in candidates.cells.iter().enumerate() {
            let width = network.cell(id)?.width;
            let assignment = self.map.get(id);

            if let Some(split @ Assignment::Fractional { .. }) = assignment {
                if !splittable || i != 0 {
                    return Err(invariant("split cell moved out of order", id).into());
                }
                let (area_src, area_snk) = split
                    .split_between(src, snk)
                    .ok_or_else(|| invariant("split cell not shared with the sink", id))?;
                if !self.map.contains(snk, id) {
                    return Err(invariant("split cell missing from the sink", id).into());
                }

                if flow + area_src <= demand + eps {
                    // Entirely into the sink.
                    self.map.remove_cell(src, id)?;
                    self.map.set(id, Assignment::Whole(snk));
                    self.transfer(src, snk, area_src)?;
                    self.moves.record_move(id);
                    flow += area_src;
                } else {
                    let diff = demand - flow;
                    if diff <= eps || diff >= area_src - eps {
                        return Err(invariant("split cell shift out of range", id).into());
                    }
                    self.map.set(
                        id,
                        Assignment::Fractional {
                            a: src,
                            area_a: area_src - diff,
                            b: snk,
                            area_b: area_snk + diff,
                        },
                    );
                    self.transfer(src, snk, diff)?;
                    flow += diff;
                }
                continue;
            }

            if self.map.contains(snk, id) {
                return Err(invariant("cell already in the sink", id).into());
            }
            if flow + width <= demand + eps || !splittable {
                self.map.remove_cell(src, id)?;
                self.map.push_cell(snk, id);
                self.map.set(id, Assignment::Whole(snk));
                self.transfer(src, snk, width)?;
                self.moves.record_move(id);
                flow += width;
            } else {
                if i != last {
                    return Err(invariant("only the last cell may be split", id).into());
                }
                let area_snk = demand - flow;
                let area_src = width - area_snk;
                if area_src <= eps || !self.map.contains(src, id) {
                    return Err(invariant("invalid split of cell", id).into());
                }
                self.map.push_cell(snk, id);
                self.map.set(
                    id,
                    Assignment::Fractional {
                        a: src,
                        area_a: area_src,
                        b: snk,
                        area_b: area_snk,
                    },
                );
                self.transfer(src, snk, area_snk)?;
                flow += area_snk;
            }
        }
        Ok(flow)
    }

    /// Shift `area` of occupancy from `src` to `snk`
    fn transfer(&mut self, src: BinId, snk: BinId, area: f64) -> Result<()> {
        let eps = self.eps();
        let from = self.graph.bin_mut(src);
        from.occupancy -= area;
        if from.occupancy < -eps {
            return Err(LegalizationInvariantError::new("negative occupancy")
                .with_bin(src)
                .into());
        }
        self.graph.bin_mut(snk).occupancy += area;
        Ok(())
    }
}
