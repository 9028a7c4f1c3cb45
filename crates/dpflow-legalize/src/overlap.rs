//! Packing cells inside their final bins
//!
//! Flow only decides which bin holds which cell. This pass moves every cell
//! into its bin, within the window its neighbours' widths leave it, and puts
//! it on the row centre. Overlap left inside a window is removed afterwards
//! by the segment pass.

use crate::assignment::CellBinMap;
use crate::bin::BinGraph;
use crate::error::Result;
use dpflow_db::{CellId, SegmentManager};

/// Place the cells of every bin inside it. Returns the number of cells placed.
pub fn remove_bin_overlap(
    mgr: &mut SegmentManager,
    graph: &BinGraph,
    map: &CellBinMap,
    eps: f64,
) -> Result<usize> {
    let mut placed = 0;
    let mut overfull = 0;

    for bin in graph.alive_bins() {
        let mut nodes: Vec<CellId> = map.cells_in_bin(bin.id).to_vec();
        if nodes.is_empty() {
            continue;
        }
        let row_y = mgr.architecture().row(bin.row).center_y();
        let (left, right) = (bin.min_x, bin.max_x);
        let space = right - left;

        let cells = mgr.network().cells();
        nodes.sort_by(|a, b| cells[a.index()].x.total_cmp(&cells[b.index()].x));

        let mut wid: Vec<f64> = nodes.iter().map(|c| cells[c.index()].width).collect();
        let mut occ: f64 = wid.iter().sum();
        for i in 1..nodes.len() {
            let gap = mgr.architecture().cell_spacing(
                Some(&cells[nodes[i - 1].index()]),
                Some(&cells[nodes[i].index()]),
            );
            if gap > eps && occ + gap <= space + eps {
                wid[i - 1] += gap;
                occ += gap;
            }
        }
        if occ >= space - eps && occ > 0.0 {
            let scale = space / occ;
            wid.iter_mut().for_each(|w| *w *= scale);
            if occ > space + eps {
                overfull += 1;
            }
        }

        // Earliest and latest left edges.
        let mut tarr = Vec::with_capacity(nodes.len());
        let mut x = left;
        for w in &wid {
            tarr.push(x);
            x += w;
        }
        let mut treq = vec![0.0; nodes.len()];
        x = right;
        for i in (0..nodes.len()).rev() {
            x -= wid[i];
            treq[i] = x;
        }

        for (i, &id) in nodes.iter().enumerate() {
            let cell = mgr.network_mut().cell_mut(id)?;
            let half = 0.5 * cell.width;
            let llx = (cell.x - half).min(treq[i]).max(tarr[i]);
            let llx = llx.min(right - cell.width).max(left);
            cell.x = llx + half;
            cell.y = row_y;
            placed += 1;
        }
    }

    if overfull > 0 {
        log::warn!("{} bins still hold more cell width than they span", overfull);
    }
    mgr.resort_segments();
    Ok(placed)
}
