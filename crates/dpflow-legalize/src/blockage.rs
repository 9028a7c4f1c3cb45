//! Multi-height cells as per-row obstacles
//!
//! The flow only moves single-height cells, so multi-height cells of the
//! region stay where they are and the bins are cut around them.

use dpflow_db::segment::merge_intervals;
use dpflow_db::{RegionId, SegmentManager};

/// Merged, sorted obstacle intervals for each row
pub fn multi_height_blockages(mgr: &SegmentManager, region: RegionId) -> Vec<Vec<(f64, f64)>> {
    let arch = mgr.architecture();
    let mut blockages = vec![Vec::new(); arch.num_rows()];

    for &id in mgr.multi_height_cells() {
        let Ok(cell) = mgr.cell(id) else {
            continue;
        };
        if cell.region != region {
            continue;
        }
        let xmin = arch.xmin.max(cell.left());
        let xmax = arch.xmax.min(cell.right());
        let ymin = arch.ymin.max(cell.bottom());
        let ymax = arch.ymax.min(cell.top());
        for r in arch.rows_overlapping(ymin, ymax) {
            blockages[r].push((xmin, xmax));
        }
    }

    blockages.into_iter().map(merge_intervals).collect()
}

/// Pieces of `[lx, rx]` not covered by the sorted `blockages`
pub fn subtract_blockages(lx: f64, rx: f64, blockages: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut pieces = Vec::new();
    let mut start = lx;
    for &(bl, br) in blockages {
        let end = rx.min(bl);
        if end > start {
            pieces.push((start, end));
        }
        start = start.max(br);
        if start >= rx {
            break;
        }
    }
    if rx > start {
        pieces.push((start, rx));
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpflow_db::{Architecture, Cell, CellId, Network};

    #[test]
    fn test_subtract_blockages() {
        assert_eq!(subtract_blockages(0.0, 100.0, &[]), vec![(0.0, 100.0)]);
        assert_eq!(
            subtract_blockages(0.0, 100.0, &[(20.0, 30.0), (50.0, 60.0)]),
            vec![(0.0, 20.0), (30.0, 50.0), (60.0, 100.0)]
        );
        assert_eq!(
            subtract_blockages(40.0, 55.0, &[(0.0, 45.0), (50.0, 120.0)]),
            vec![(45.0, 50.0)]
        );
        assert!(subtract_blockages(10.0, 20.0, &[(0.0, 30.0)]).is_empty());
    }

    #[test]
    fn test_multi_height_blockages_cover_spanned_rows() {
        let arch = Architecture::uniform(3, 100, 10.0, 1.0).unwrap();
        let mut net = Network::new();
        net.add_cell(Cell::new(CellId(0), 20.0, 10.0, 10.0, 20.0));
        net.add_cell(Cell::new(CellId(0), 28.0, 10.0, 6.0, 20.0));
        net.add_cell(Cell::new(CellId(0), 70.0, 5.0, 4.0, 10.0));
        let mgr = SegmentManager::new(arch, net).unwrap();

        let blockages = multi_height_blockages(&mgr, RegionId::DEFAULT);
        assert_eq!(blockages[0], vec![(15.0, 31.0)]);
        assert_eq!(blockages[1], vec![(15.0, 31.0)]);
        assert!(blockages[2].is_empty());
    }
}
