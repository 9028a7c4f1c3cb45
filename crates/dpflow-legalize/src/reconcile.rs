//! Handing bin membership back to the segment manager

use crate::assignment::{Assignment, CellBinMap};
use crate::bin::BinGraph;
use crate::error::{LegalizerError, Result};
use crate::flow::FlowState;
use dpflow_db::{CellId, Network, RegionId, SegmentId, SegmentManager};

impl<'a> FlowState<'a> {
    /// Settle cells still split between two bins of one segment on the bin
    /// holding the larger share. Returns the number of cells settled.
    pub fn resolve_fractions(&mut self, network: &Network) -> Result<usize> {
        let split: Vec<(CellId, Assignment)> = self
            .map
            .assigned()
            .filter(|(_, a)| a.is_fractional())
            .collect();

        for &(id, assignment) in &split {
            let Assignment::Fractional { a, area_a, b, area_b } = assignment else {
                continue;
            };
            let (bin_a, bin_b) = (self.graph.bin(a), self.graph.bin(b));
            if bin_a.row != bin_b.row || bin_a.segment != bin_b.segment {
                return Err(LegalizerError::UnresolvedFractional {
                    cell: id,
                    first: a,
                    second: b,
                });
            }

            let (keep, drop, moved) = if area_a >= area_b {
                (a, b, area_b)
            } else {
                (b, a, area_a)
            };
            self.map.remove_cell(drop, id)?;
            self.map.set(id, Assignment::Whole(keep));
            self.graph.bin_mut(drop).occupancy -= moved;
            self.graph.bin_mut(keep).occupancy += moved;
            log::debug!(
                "Settled split {} of width {:.1} in {}",
                id,
                network.cell(id)?.width,
                keep
            );
        }
        Ok(split.len())
    }
}

/// Segment of each single-height cell of `region` before any flow
pub fn original_segments(mgr: &SegmentManager, region: RegionId) -> Vec<Option<SegmentId>> {
    let mut original = vec![None; mgr.network().num_cells()];
    let row_height = mgr.single_row_height();
    for seg in mgr.segments() {
        for &id in mgr.cells_in_segment(seg.id) {
            let Ok(cell) = mgr.cell(id) else {
                continue;
            };
            if cell.region == region && cell.row_span(row_height) == 1 {
                original[id.index()] = Some(seg.id);
            }
        }
    }
    original
}

/// Move cells whose bin lies in a different segment than the one they
/// started in. Returns the number of cells moved between segments.
pub fn reconcile_segments(
    mgr: &mut SegmentManager,
    graph: &BinGraph,
    map: &CellBinMap,
    original: &[Option<SegmentId>],
) -> Result<usize> {
    let mut changed = 0;
    for bin in graph.alive_bins() {
        for &id in map.cells_in_bin(bin.id) {
            if let Some(Assignment::Fractional { a, b, .. }) = map.get(id) {
                return Err(LegalizerError::UnresolvedFractional {
                    cell: id,
                    first: a,
                    second: b,
                });
            }
            let before = original.get(id.index()).copied().flatten();
            if before == Some(bin.segment) {
                continue;
            }
            if let Some(old) = before {
                mgr.remove_cell_from_segment(id, old)?;
            }
            mgr.add_cell_to_segment(id, bin.segment)?;
            changed += 1;
        }
    }
    log::info!("Moved {} cells between segments", changed);
    Ok(changed)
}
