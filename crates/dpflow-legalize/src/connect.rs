//! Bin graph connectivity
//!
//! Edges only join bins of the same region, so flow never carries a cell out
//! of its region. Bins narrower than the narrowest cell can send flow but
//! never receive it. A scan stops once it has linked a bin wide enough for
//! the widest cell, which lets searches bypass slivers between obstacles.

use crate::bin::{BinGraph, BinId, Edge};
use crate::stats::CellWidthStats;

impl BinGraph {
    /// Rebuild all edges from scratch
    pub fn connect(&mut self, stats: &CellWidthStats, eps: f64) {
        self.disconnect();

        let min_width = stats.min - eps;
        let max_width = stats.max - eps;
        let mut horizontal = 0;
        let mut vertical = 0;

        for r in 0..self.num_rows() {
            let row = self.bins_in_row[r].clone();
            for (c, &from) in row.iter().enumerate() {
                // Left, then right.
                for &to in row[..c].iter().rev() {
                    if let Some(wide) = self.try_link(from, to, min_width, max_width) {
                        horizontal += 1;
                        if wide {
                            break;
                        }
                    }
                }
                for &to in &row[c + 1..] {
                    if let Some(wide) = self.try_link(from, to, min_width, max_width) {
                        horizontal += 1;
                        if wide {
                            break;
                        }
                    }
                }

                // Rows above, then rows below.
                let above = (r + 1..self.num_rows()).collect::<Vec<_>>();
                let below = (0..r).rev().collect::<Vec<_>>();
                for rows in [above, below] {
                    for other in rows {
                        let mut found_wide = false;
                        for to in self.bins_in_row[other].clone() {
                            let (a, b) = (self.bin(from), self.bin(to));
                            let overlap = a.max_x.min(b.max_x) - a.min_x.max(b.min_x);
                            if overlap <= eps {
                                continue;
                            }
                            if let Some(wide) = self.try_link(from, to, min_width, max_width) {
                                vertical += 1;
                                found_wide |= wide;
                            }
                        }
                        if found_wide {
                            break;
                        }
                    }
                }
            }
        }

        for bin in self.alive_bins() {
            if self.edges(bin.id).is_empty() {
                log::debug!("{} has no outgoing edges", bin.id);
            }
        }
        log::debug!(
            "Connected bins with {} horizontal and {} vertical edges",
            horizontal,
            vertical
        );
    }

    /// Remove all edges
    pub fn disconnect(&mut self) {
        for i in 0..self.num_bins() {
            self.edges_mut(BinId(i as u32)).clear();
        }
    }

    /// Link `from` to `to` if they share a region and `to` can take a cell.
    /// Returns whether `to` is wide enough for any cell, or `None` when no
    /// edge was added.
    fn try_link(&mut self, from: BinId, to: BinId, min_width: f64, max_width: f64) -> Option<bool> {
        let (a, b) = (self.bin(from), self.bin(to));
        if a.region != b.region {
            return None;
        }
        let width = b.width();
        if width < min_width {
            return None;
        }
        let cost = (a.center_x() - b.center_x()).abs() + (a.center_y() - b.center_y()).abs();
        self.edges_mut(from).push(Edge { to, cost });
        Some(width >= max_width)
    }
}
