//! Bin coarsening
//!
//! When flow stalls at the current granularity, runs of adjacent bins whose
//! centres fall in the same bucket of the new bin width are merged. Merging
//! never moves cells, it only pools their area.

use crate::assignment::Assignment;
use crate::bin::BinId;
use crate::error::{LegalizationInvariantError, Result};
use crate::flow::FlowState;
use dpflow_db::Network;

impl<'a> FlowState<'a> {
    fn bucket(&self, bin: BinId) -> i64 {
        ((self.graph.bin(bin).center_x() - self.xmin) / self.bin_width).floor() as i64
    }

    /// Merge bins to the current `bin_width` and rebuild the edges. Returns
    /// the number of bins eliminated.
    pub fn merge_bins(&mut self, network: &Network) -> Result<usize> {
        let eps = self.config.epsilon;
        log::info!("Merging bins with target width of {:.1}", self.bin_width);

        let mut eliminated = 0;
        for r in 0..self.graph.num_rows() {
            let row = self.graph.bins_in_row(r).to_vec();
            if row.len() <= 1 {
                continue;
            }

            let mut b = 0;
            while b < row.len() {
                let snk = row[b];
                let ix = self.bucket(snk);
                b += 1;
                while b < row.len() {
                    let src = row[b];
                    if self.bucket(src) != ix || !self.graph.adjacent(snk, src, eps) {
                        break;
                    }
                    self.absorb_bin(network, snk, src)?;
                    eliminated += 1;
                    b += 1;
                }
            }
        }

        self.graph.disconnect();
        self.graph.remove_dead();
        self.graph.connect(&self.stats, eps);

        log::info!(
            "Merging eliminated {} bins, {} remain, overfilled bins {}",
            eliminated,
            self.graph.num_alive(),
            self.graph.count_overfilled(eps)
        );
        Ok(eliminated)
    }

    /// Move every cell of `src` into `snk` and give `snk` the combined span
    fn absorb_bin(&mut self, network: &Network, snk: BinId, src: BinId) -> Result<()> {
        while let Some(id) = self.map.pop_cell(src) {
            let width = network.cell(id)?.width;
            let assignment = self.map.get(id);
            let area = assignment.map_or(0.0, |a| a.area_in(src, width));
            let partner = assignment.and_then(|a| a.partner(src));

            if area <= 0.0 {
                return Err(LegalizationInvariantError::new("cell listed in a bin it is not in")
                    .with_bin(src)
                    .with_cell(id)
                    .into());
            }

            if partner == Some(snk) {
                if !self.map.contains(snk, id) {
                    return Err(LegalizationInvariantError::new("split cell missing from its bin")
                        .with_bin(snk)
                        .with_cell(id)
                        .into());
                }
                self.map.set(id, Assignment::Whole(snk));
            } else {
                if self.map.contains(snk, id) {
                    return Err(LegalizationInvariantError::new("cell already in merged bin")
                        .with_bin(snk)
                        .with_cell(id)
                        .into());
                }
                self.map.push_cell(snk, id);
                let merged = match (assignment, partner) {
                    (Some(a), Some(other)) => Assignment::Fractional {
                        a: snk,
                        area_a: area,
                        b: other,
                        area_b: a.area_in(other, width),
                    },
                    _ => Assignment::Whole(snk),
                };
                self.map.set(id, merged);
            }

            self.graph.bin_mut(src).occupancy -= area;
            self.graph.bin_mut(snk).occupancy += area;
        }

        let (lo, hi) = {
            let (a, b) = (self.graph.bin(snk), self.graph.bin(src));
            (a.min_x.min(b.min_x), a.max_x.max(b.max_x))
        };
        let sink = self.graph.bin_mut(snk);
        sink.min_x = lo;
        sink.max_x = hi;
        let source = self.graph.bin_mut(src);
        source.min_x = hi;
        source.max_x = hi;
        source.alive = false;
        Ok(())
    }
}
