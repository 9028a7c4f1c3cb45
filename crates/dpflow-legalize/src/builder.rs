//! Bin construction over row segments

use crate::bin::{Bin, BinGraph, BinId};
use crate::blockage::subtract_blockages;
use dpflow_db::{RegionId, Segment, SegmentManager};

/// Cut every segment into bins of roughly `bin_width`, avoiding `blockages`.
///
/// Bins are aligned to the chip origin at multiples of the width. A piece
/// narrower than the width is folded into the bin to its left. Segments of
/// other regions get bins too; the connector and assigner ignore them.
pub fn build_bins(
    mgr: &SegmentManager,
    region: RegionId,
    blockages: &[Vec<(f64, f64)>],
    bin_width: f64,
    ut: f64,
    eps: f64,
) -> BinGraph {
    let arch = mgr.architecture();
    let mut graph = BinGraph::new(arch.num_rows(), mgr.segments().len());
    let no_blockages = Vec::new();
    if bin_width <= eps {
        log::warn!("Bin width {:.3} too small, using one bin per free span", bin_width);
    }

    for r in 0..arch.num_rows() {
        let row = arch.row(r);
        let (min_y, max_y) = (row.y, row.top());
        let row_blockages = blockages.get(r).unwrap_or(&no_blockages);

        for &seg_id in mgr.segments_in_row(r) {
            let Ok(seg) = mgr.segment(seg_id) else {
                continue;
            };
            let make_bin = |min_x: f64, max_x: f64| Bin {
                id: BinId(0),
                row: r,
                segment: seg.id,
                region: seg.region,
                min_x,
                max_x,
                min_y,
                max_y,
                ut,
                occupancy: 0.0,
                alive: true,
            };

            let pieces = subtract_blockages(seg.min_x, seg.max_x, row_blockages);
            if pieces.is_empty() {
                if holds_single_height_cells(mgr, seg, region) {
                    let cx = seg.center_x();
                    let id = graph.add_bin(make_bin(cx, cx));
                    log::warn!(
                        "No room in {} holding single height cells, created dummy {} at {:.1}",
                        seg.id,
                        id,
                        cx
                    );
                }
                continue;
            }

            for (lx, rx) in pieces {
                if rx - lx <= bin_width + eps || bin_width <= eps {
                    graph.add_bin(make_bin(lx, rx));
                    continue;
                }

                let mut last: Option<BinId> = None;
                let first = ((lx - arch.xmin) / bin_width).floor().max(0.0) as usize;
                for b in first.. {
                    let x1 = arch.xmin + b as f64 * bin_width;
                    let x2 = x1 + bin_width;
                    if x2 <= lx {
                        continue;
                    }
                    if x1 >= rx {
                        break;
                    }
                    let (bl, br) = (x1.max(lx), x2.min(rx));
                    if bl >= br {
                        continue;
                    }

                    let extend = last.filter(|&id| {
                        let prev = graph.bin(id);
                        prev.max_x == bl
                            && (br - bl <= bin_width - eps || prev.width() <= bin_width - eps)
                    });
                    match extend {
                        Some(id) => {
                            let prev = graph.bin_mut(id);
                            prev.min_x = prev.min_x.min(bl);
                            prev.max_x = prev.max_x.max(br);
                        }
                        None => last = Some(graph.add_bin(make_bin(bl, br))),
                    }
                }
            }
        }
    }

    log::debug!(
        "Built {} bins of width {:.1} over {} segments",
        graph.num_bins(),
        bin_width,
        mgr.segments().len()
    );
    graph
}

fn holds_single_height_cells(mgr: &SegmentManager, seg: &Segment, region: RegionId) -> bool {
    let row_height = mgr.single_row_height();
    mgr.cells_in_segment(seg.id).iter().any(|&id| {
        mgr.cell(id)
            .map(|c| c.region == region && c.row_span(row_height) == 1)
            .unwrap_or(false)
    })
}
