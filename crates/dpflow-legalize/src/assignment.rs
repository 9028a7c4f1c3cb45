//! Cell-to-bin assignment
//!
//! Each single-height cell of the region is either wholly inside one bin or
//! split between two adjacent bins of the same segment. A split cell is
//! listed in both bins.

use crate::bin::{BinGraph, BinId};
use crate::error::{LegalizationInvariantError, LegalizerError, Result};
use dpflow_db::{Cell, CellId, RegionId, SegmentManager};

/// Where a cell's area currently lives
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Assignment {
    Whole(BinId),
    /// `area_a + area_b` equals the cell width
    Fractional {
        a: BinId,
        area_a: f64,
        b: BinId,
        area_b: f64,
    },
}

impl Assignment {
    pub fn is_fractional(&self) -> bool {
        matches!(self, Assignment::Fractional { .. })
    }

    /// Area of a cell of `width` held by `bin`
    pub fn area_in(&self, bin: BinId, width: f64) -> f64 {
        match *self {
            Assignment::Whole(b) if b == bin => width,
            Assignment::Fractional { a, area_a, .. } if a == bin => area_a,
            Assignment::Fractional { b, area_b, .. } if b == bin => area_b,
            _ => 0.0,
        }
    }

    /// The bin sharing a fractional cell with `bin`
    pub fn partner(&self, bin: BinId) -> Option<BinId> {
        match *self {
            Assignment::Fractional { a, b, .. } if a == bin => Some(b),
            Assignment::Fractional { a, b, .. } if b == bin => Some(a),
            _ => None,
        }
    }

    /// Areas held in `src` and `snk` if the cell is split exactly between them
    pub fn split_between(&self, src: BinId, snk: BinId) -> Option<(f64, f64)> {
        match *self {
            Assignment::Fractional { a, area_a, b, area_b } if a == src && b == snk => {
                Some((area_a, area_b))
            }
            Assignment::Fractional { a, area_a, b, area_b } if b == src && a == snk => {
                Some((area_b, area_a))
            }
            _ => None,
        }
    }
}

/// Assignment of every cell plus the cells listed in each bin
#[derive(Debug, Clone, Default)]
pub struct CellBinMap {
    assignment: Vec<Option<Assignment>>,
    cells_in_bin: Vec<Vec<CellId>>,
}

impl CellBinMap {
    pub fn new(num_cells: usize, num_bins: usize) -> Self {
        Self {
            assignment: vec![None; num_cells],
            cells_in_bin: vec![Vec::new(); num_bins],
        }
    }

    pub fn get(&self, cell: CellId) -> Option<Assignment> {
        self.assignment.get(cell.index()).copied().flatten()
    }

    pub fn set(&mut self, cell: CellId, assignment: Assignment) {
        self.assignment[cell.index()] = Some(assignment);
    }

    /// Cells assigned so far
    pub fn assigned(&self) -> impl Iterator<Item = (CellId, Assignment)> + '_ {
        self.assignment
            .iter()
            .enumerate()
            .filter_map(|(i, a)| a.map(|a| (CellId(i as u32), a)))
    }

    pub fn cells_in_bin(&self, bin: BinId) -> &[CellId] {
        &self.cells_in_bin[bin.index()]
    }

    pub fn contains(&self, bin: BinId, cell: CellId) -> bool {
        self.cells_in_bin[bin.index()].contains(&cell)
    }

    pub fn push_cell(&mut self, bin: BinId, cell: CellId) {
        self.cells_in_bin[bin.index()].push(cell);
    }

    pub fn pop_cell(&mut self, bin: BinId) -> Option<CellId> {
        self.cells_in_bin[bin.index()].pop()
    }

    /// Remove `cell` from the list of `bin`, keeping the order of the rest
    pub fn remove_cell(&mut self, bin: BinId, cell: CellId) -> Result<()> {
        let list = &mut self.cells_in_bin[bin.index()];
        let ix = list.iter().position(|&c| c == cell).ok_or_else(|| {
            LegalizationInvariantError::new("cell missing from its bin")
                .with_bin(bin)
                .with_cell(cell)
        })?;
        list.remove(ix);
        Ok(())
    }

    pub(crate) fn sort_bin_by(&mut self, bin: BinId, key: impl Fn(CellId) -> f64) {
        self.cells_in_bin[bin.index()].sort_by(|&a, &b| key(a).total_cmp(&key(b)));
    }
}

/// Shift needed to put `cell` inside `[min_x, max_x]`
fn shift_into(cell: &Cell, min_x: f64, max_x: f64) -> f64 {
    let xx = cell.x.min(max_x - 0.5 * cell.width).max(min_x + 0.5 * cell.width);
    (xx - cell.x).abs()
}

/// Bin of `segment` needing the least shift to hold `cell`. Bins without
/// outgoing edges are used only if the segment has nothing else.
fn closest_bin(graph: &BinGraph, candidates: &[BinId], cell: &Cell) -> Option<BinId> {
    let pick = |with_edges: bool| {
        let mut best: Option<(BinId, f64)> = None;
        for &id in candidates {
            if with_edges && graph.edges(id).is_empty() {
                continue;
            }
            let bin = graph.bin(id);
            let dist = shift_into(cell, bin.min_x, bin.max_x);
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((id, dist));
            }
        }
        best.map(|(id, _)| id)
    };
    pick(true).or_else(|| pick(false))
}

/// Put every single-height cell of `region` into the closest bin of the
/// segment it currently occupies.
pub fn assign_cells_to_bins(
    mgr: &SegmentManager,
    graph: &mut BinGraph,
    region: RegionId,
) -> Result<CellBinMap> {
    let mut map = CellBinMap::new(mgr.network().num_cells(), graph.num_bins());
    let row_height = mgr.single_row_height();

    for seg in mgr.segments() {
        for &id in mgr.cells_in_segment(seg.id) {
            let cell = mgr.cell(id)?;
            if cell.region != region || cell.row_span(row_height) != 1 {
                continue;
            }
            let bin = closest_bin(graph, graph.bins_in_segment(seg.id), cell)
                .ok_or(LegalizerError::NoFeasibleBin { segment: seg.id })?;
            map.push_cell(bin, id);
            map.set(id, Assignment::Whole(bin));
            graph.bin_mut(bin).occupancy += cell.width;
        }
    }

    let cells = mgr.network().cells();
    for b in 0..graph.num_bins() {
        map.sort_bin_by(BinId(b as u32), |c| cells[c.index()].x);
    }
    Ok(map)
}
