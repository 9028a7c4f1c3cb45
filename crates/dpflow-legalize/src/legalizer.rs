//! Flow legalizer driver
//!
//! Per region:
//! - bins are built at the initial width and cells assigned to them
//! - flow runs at growing displacement bounds, then bins are merged to a
//!   wider width and flow runs again, until nothing is overfull
//! - a final merge leaves one bin per free stretch of each segment
//! - segment membership and cell positions are written back

use crate::assignment::assign_cells_to_bins;
use crate::blockage::multi_height_blockages;
use crate::builder::build_bins;
use crate::config::FlowLegalizerConfig;
use crate::error::Result;
use crate::flow::{FlowState, MoveTracker};
use crate::overlap::remove_bin_overlap;
use crate::reconcile::{original_segments, reconcile_segments};
use crate::search::SearchLabels;
use crate::stats::CellWidthStats;
use dpflow_db::{RegionId, SegmentManager};
use serde::{Deserialize, Serialize};

/// Outcome of legalizing one region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionReport {
    pub region: RegionId,
    /// Single-height cells legalized
    pub cells: usize,
    /// Flow passes run before the final merge
    pub outer_passes: usize,
    /// Bins built at the initial width
    pub bins: usize,
    pub initial_bin_width: f64,
    pub final_bin_width: f64,
    /// Augmenting paths executed
    pub paths: usize,
    /// Whole-cell moves between bins
    pub cell_moves: usize,
    pub segment_changes: usize,
    pub fractions_resolved: usize,
    /// Bins still overfull after the final merge
    pub overfilled_bins: usize,
    pub converged: bool,
    /// Total displacement of the region's cells from their original positions
    pub displacement: f64,
}

impl RegionReport {
    fn empty(region: RegionId) -> Self {
        Self {
            region,
            cells: 0,
            outer_passes: 0,
            bins: 0,
            initial_bin_width: 0.0,
            final_bin_width: 0.0,
            paths: 0,
            cell_moves: 0,
            segment_changes: 0,
            fractions_resolved: 0,
            overfilled_bins: 0,
            converged: true,
            displacement: 0.0,
        }
    }
}

/// Outcome of legalizing every region
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegalizationReport {
    /// In processing order, highest region id first
    pub regions: Vec<RegionReport>,
}

impl LegalizationReport {
    pub fn converged(&self) -> bool {
        self.regions.iter().all(|r| r.converged)
    }

    pub fn cell_moves(&self) -> usize {
        self.regions.iter().map(|r| r.cell_moves).sum()
    }

    pub fn displacement(&self) -> f64 {
        self.regions.iter().map(|r| r.displacement).sum()
    }
}

/// Flow-based legalizer for single-height cells
#[derive(Debug, Clone, Default)]
pub struct FlowLegalizer {
    config: FlowLegalizerConfig,
}

impl FlowLegalizer {
    pub fn new(config: FlowLegalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FlowLegalizerConfig {
        &self.config
    }

    /// Legalize every region, highest id first
    pub fn legalize(&self, mgr: &mut SegmentManager) -> Result<LegalizationReport> {
        self.config.validate()?;

        let mut regions: Vec<RegionId> = mgr
            .architecture()
            .regions()
            .iter()
            .map(|r| r.id)
            .collect();
        regions.sort();

        let mut report = LegalizationReport::default();
        for region in regions.into_iter().rev() {
            report.regions.push(self.legalize_region(mgr, region)?);
        }

        log::info!(
            "Legalized {} regions, {} cell moves, displacement {:.1}",
            report.regions.len(),
            report.cell_moves(),
            report.displacement()
        );
        Ok(report)
    }

    /// Legalize the single-height cells of one region
    pub fn legalize_region(
        &self,
        mgr: &mut SegmentManager,
        region: RegionId,
    ) -> Result<RegionReport> {
        self.config.validate()?;
        mgr.architecture().region(region)?;
        let eps = self.config.epsilon;

        let cells: Vec<_> = mgr
            .single_height_cells()
            .iter()
            .copied()
            .filter(|&id| mgr.cell(id).map_or(false, |c| c.region == region))
            .collect();
        if cells.is_empty() {
            log::debug!("No single height cells in {}", region);
            return Ok(RegionReport::empty(region));
        }

        let mut widths = Vec::with_capacity(cells.len());
        for &id in &cells {
            widths.push(mgr.cell(id)?.width);
        }
        let stats = CellWidthStats::from_widths(widths);
        // Zero-width cells would otherwise give zero-width bins.
        let site_width = mgr.architecture().rows().first().map_or(1.0, |r| r.site_width);
        let initial_width = stats
            .initial_bin_width(self.config.utilization_target, self.config.bin_width_tolerance)
            .max(site_width)
            .max(self.config.epsilon);
        log::info!(
            "Legalizing {} cells in {}, widths min {:.1} max {:.1} avg {:.1} median {:.1}, bin width {:.1}",
            stats.count,
            region,
            stats.min,
            stats.max,
            stats.avg,
            stats.median,
            initial_width
        );

        let original = original_segments(mgr, region);
        let blockages = multi_height_blockages(mgr, region);
        let mut graph = build_bins(
            mgr,
            region,
            &blockages,
            initial_width,
            self.config.utilization_target,
            eps,
        );
        graph.connect(&stats, eps);
        let map = assign_cells_to_bins(mgr, &mut graph, region)?;
        let bins = graph.num_bins();

        let arch = mgr.architecture();
        let chip_width = arch.width();
        let mut state = FlowState {
            config: &self.config,
            stats,
            graph,
            map,
            moves: MoveTracker::new(mgr.network().num_cells(), self.config.move_limit),
            labels: SearchLabels::default(),
            bin_width: initial_width,
            row_height: mgr.single_row_height(),
            xmin: arch.xmin,
            xmax: arch.xmax,
            chip_extent: arch.width().max(arch.height()),
            max_displacement: 0.0,
            paths: 0,
        };

        let network = mgr.network();
        let mut pass = 1;
        let mut outer_passes = 0;
        let mut stagnant = 0;
        loop {
            let overfilled = state.graph.count_overfilled(eps);
            log::info!(
                "Pass {}, bins {}, bin width {:.1}, overfilled bins {}",
                pass,
                state.graph.num_alive(),
                state.bin_width,
                overfilled
            );
            if overfilled == 0 {
                break;
            }

            outer_passes += 1;
            state.path_flow(network)?;
            if state.bin_width > chip_width {
                break;
            }

            pass += 1;
            state.bin_width = pass as f64 * initial_width;
            if state.merge_bins(network)? == 0 {
                stagnant += 1;
                if stagnant > self.config.merge_stagnation_limit {
                    break;
                }
            }
        }
        let final_bin_width = state.bin_width;

        state.bin_width = state.xmax - state.xmin;
        state.merge_bins(network)?;
        let overfilled_bins = state.graph.count_overfilled(eps);
        let fractions_resolved = state.resolve_fractions(network)?;

        let segment_changes = reconcile_segments(mgr, &state.graph, &state.map, &original)?;
        remove_bin_overlap(mgr, &state.graph, &state.map, eps)?;
        mgr.remove_segment_overlap_single(Some(region))?;

        let mut displacement = 0.0;
        for &id in &cells {
            displacement += mgr.cell(id)?.displacement();
        }

        let converged = overfilled_bins == 0;
        if !converged {
            log::warn!(
                "{} bins of {} remain overfilled after {} passes",
                overfilled_bins,
                region,
                outer_passes
            );
        }

        Ok(RegionReport {
            region,
            cells: cells.len(),
            outer_passes,
            bins,
            initial_bin_width: initial_width,
            final_bin_width,
            paths: state.paths,
            cell_moves: state.moves.total(),
            segment_changes,
            fractions_resolved,
            overfilled_bins,
            converged,
            displacement,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpflow_db::{Architecture, Cell, CellId, Network, Rect};

    #[test]
    fn test_region_without_cells_is_untouched() {
        let mut arch = Architecture::uniform(2, 100, 10.0, 1.0).unwrap();
        let fence = arch.add_region(vec![Rect::new(0.0, 0.0, 50.0, 20.0)]);
        let mut net = Network::new();
        net.add_cell(Cell::new(CellId(0), 70.0, 5.0, 10.0, 10.0));
        let mut mgr = SegmentManager::new(arch, net).unwrap();

        let report = FlowLegalizer::default()
            .legalize_region(&mut mgr, fence)
            .unwrap();
        assert_eq!(report.cells, 0);
        assert!(report.converged);
        assert_eq!(mgr.cell(CellId(0)).unwrap().x, 70.0);
    }

    #[test]
    fn test_unknown_region_is_error() {
        let arch = Architecture::uniform(1, 100, 10.0, 1.0).unwrap();
        let mut mgr = SegmentManager::new(arch, Network::new()).unwrap();
        let err = FlowLegalizer::default()
            .legalize_region(&mut mgr, RegionId(5))
            .unwrap_err();
        assert!(matches!(err, crate::LegalizerError::Segment(_)));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let arch = Architecture::uniform(1, 100, 10.0, 1.0).unwrap();
        let mut mgr = SegmentManager::new(arch, Network::new()).unwrap();
        let legalizer = FlowLegalizer::new(FlowLegalizerConfig::default().with_move_limit(0));
        assert!(matches!(
            legalizer.legalize(&mut mgr),
            Err(crate::LegalizerError::Config(_))
        ));
    }

    #[test]
    fn test_zero_width_cells_terminate() {
        let arch = Architecture::uniform(1, 100, 10.0, 1.0).unwrap();
        let mut net = Network::new();
        net.add_cell(Cell::new(CellId(0), 10.0, 5.0, 0.0, 10.0));
        let mut mgr = SegmentManager::new(arch, net).unwrap();

        let report = FlowLegalizer::default().legalize(&mut mgr).unwrap();
        assert!(report.converged());
        assert_eq!(report.regions[0].initial_bin_width, 1.0);
        assert_eq!(report.cell_moves(), 0);
        assert_eq!(mgr.cell(CellId(0)).unwrap().x, 10.0);
    }

    #[test]
    fn test_overflow_spills_into_next_row() {
        let arch = Architecture::uniform(2, 100, 10.0, 1.0).unwrap();
        let mut net = Network::new();
        for x in [10.0, 40.0, 70.0] {
            net.add_cell(Cell::new(CellId(0), x, 5.0, 40.0, 10.0));
        }
        let mut mgr = SegmentManager::new(arch, net).unwrap();

        let report = FlowLegalizer::default().legalize(&mut mgr).unwrap();
        assert!(report.converged());
        assert_eq!(mgr.check_overlap_in_segments(), 0);

        let rows: Vec<f64> = mgr.network().cells().iter().map(|c| c.y).collect();
        assert_eq!(rows.iter().filter(|&&y| y == 5.0).count(), 2);
        assert_eq!(rows.iter().filter(|&&y| y == 15.0).count(), 1);
    }
}
