//! End-to-end tests for flow legalization

use dpflow_db::{Architecture, Cell, CellId, Network, Rect, RegionId, SegmentManager};
use dpflow_legalize::{FlowLegalizer, FlowLegalizerConfig, LegalizerError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn manager(arch: Architecture, cells: Vec<Cell>) -> SegmentManager {
    let mut net = Network::new();
    for cell in cells {
        net.add_cell(cell);
    }
    SegmentManager::new(arch, net).unwrap()
}

fn assert_rows_and_segments_agree(mgr: &SegmentManager) {
    for cell in mgr.network().cells() {
        let segs = mgr.segments_of_cell(cell.id);
        assert_eq!(segs.len(), 1, "{} is in {} segments", cell.id, segs.len());
        let seg = mgr.segment(segs[0]).unwrap();
        assert_eq!(cell.y, mgr.architecture().row(seg.row).center_y());
        assert!(cell.left() >= seg.min_x - 1e-3 && cell.right() <= seg.max_x + 1e-3);
    }
}

#[test]
fn test_three_wide_cells_in_two_rows() {
    let arch = Architecture::uniform(2, 100, 10.0, 1.0).unwrap();
    let mut mgr = manager(
        arch,
        vec![
            Cell::new(CellId(0), 10.0, 5.0, 40.0, 10.0),
            Cell::new(CellId(0), 40.0, 5.0, 40.0, 10.0),
            Cell::new(CellId(0), 70.0, 5.0, 40.0, 10.0),
        ],
    );

    let report = FlowLegalizer::default().legalize(&mut mgr).unwrap();
    assert!(report.converged());
    assert_eq!(report.regions.len(), 1);
    let region = &report.regions[0];
    assert_eq!(region.cells, 3);
    assert_eq!(region.cell_moves, 1);
    assert_eq!(region.segment_changes, 1);
    assert_eq!(region.overfilled_bins, 0);

    assert_eq!(mgr.check_overlap_in_segments(), 0);
    assert_rows_and_segments_agree(&mgr);
    let upper = mgr
        .network()
        .cells()
        .iter()
        .filter(|c| c.y == 15.0)
        .count();
    assert_eq!(upper, 1);
    for cell in mgr.network().cells() {
        assert_eq!(cell.width, 40.0);
    }
}

#[test]
fn test_legal_layout_is_left_alone() {
    let arch = Architecture::uniform(2, 100, 10.0, 1.0).unwrap();
    let mut mgr = manager(
        arch,
        vec![
            Cell::new(CellId(0), 5.0, 5.0, 10.0, 10.0),
            Cell::new(CellId(0), 20.0, 5.0, 10.0, 10.0),
            Cell::new(CellId(0), 35.0, 5.0, 10.0, 10.0),
            Cell::new(CellId(0), 60.0, 15.0, 10.0, 10.0),
        ],
    );

    let report = FlowLegalizer::default().legalize(&mut mgr).unwrap();
    assert!(report.converged());
    assert_eq!(report.cell_moves(), 0);
    assert_eq!(report.regions[0].outer_passes, 0);
    assert_eq!(report.regions[0].paths, 0);
    assert_eq!(report.displacement(), 0.0);

    let xs: Vec<f64> = mgr.network().cells().iter().map(|c| c.x).collect();
    assert_eq!(xs, vec![5.0, 20.0, 35.0, 60.0]);
    assert_eq!(mgr.network().total_displacement(), 0.0);
}

#[test]
fn test_cells_stay_in_their_fence() {
    let mut arch = Architecture::uniform(2, 100, 10.0, 1.0).unwrap();
    let fence = arch.add_region(vec![Rect::new(0.0, 0.0, 50.0, 20.0)]);
    let mut mgr = manager(
        arch,
        vec![
            Cell::new(CellId(0), 10.0, 5.0, 20.0, 10.0).with_region(fence),
            Cell::new(CellId(0), 20.0, 5.0, 20.0, 10.0).with_region(fence),
            Cell::new(CellId(0), 30.0, 5.0, 20.0, 10.0).with_region(fence),
            Cell::new(CellId(0), 80.0, 5.0, 10.0, 10.0),
        ],
    );

    let report = FlowLegalizer::default().legalize(&mut mgr).unwrap();
    assert!(report.converged());
    // Fence first, then the default region.
    let order: Vec<RegionId> = report.regions.iter().map(|r| r.region).collect();
    assert_eq!(order, vec![fence, RegionId::DEFAULT]);

    for cell in mgr.network().cells() {
        if cell.region == fence {
            assert!(cell.left() >= 0.0 && cell.right() <= 50.0);
            let seg = mgr.segment(mgr.segments_of_cell(cell.id)[0]).unwrap();
            assert_eq!(seg.region, fence);
        }
    }
    assert_eq!(mgr.cell(CellId(3)).unwrap().x, 80.0);
    assert_eq!(mgr.check_overlap_in_segments(), 0);
    assert_rows_and_segments_agree(&mgr);
}

#[test]
fn test_random_layout_becomes_legal() {
    let mut rng = StdRng::seed_from_u64(7);
    let arch = Architecture::uniform(4, 100, 10.0, 1.0).unwrap();
    let cells: Vec<Cell> = (0..24)
        .map(|_| {
            let width = rng.gen_range(2..=8) as f64;
            let x = rng.gen_range(0..(100 - width as i32)) as f64 + 0.5 * width;
            let y = rng.gen_range(0..4) as f64 * 10.0 + 5.0;
            Cell::new(CellId(0), x, y, width, 10.0)
        })
        .collect();
    let total_width: f64 = cells.iter().map(|c| c.width).sum();
    let mut mgr = manager(arch, cells);

    let report = FlowLegalizer::default().legalize(&mut mgr).unwrap();
    assert!(report.converged());
    assert_eq!(mgr.check_overlap_in_segments(), 0);
    assert_rows_and_segments_agree(&mgr);

    let after: f64 = mgr.network().cells().iter().map(|c| c.width).sum();
    assert_eq!(after, total_width);
    let listed: usize = mgr
        .segments()
        .iter()
        .map(|s| mgr.cells_in_segment(s.id).len())
        .sum();
    assert_eq!(listed, 24);
}

#[test]
fn test_overfull_row_reports_no_convergence() {
    let arch = Architecture::uniform(1, 100, 10.0, 1.0).unwrap();
    let cells = [20.0, 40.0, 60.0, 80.0]
        .iter()
        .map(|&x| Cell::new(CellId(0), x, 5.0, 40.0, 10.0))
        .collect();
    let mut mgr = manager(arch, cells);

    let report = FlowLegalizer::default().legalize(&mut mgr).unwrap();
    assert!(!report.converged());
    let region = &report.regions[0];
    assert!(!region.converged);
    assert!(region.overfilled_bins > 0);
    assert_eq!(region.cells, 4);

    // Every cell is still listed and inside the row.
    let listed: usize = mgr
        .segments()
        .iter()
        .map(|s| mgr.cells_in_segment(s.id).len())
        .sum();
    assert_eq!(listed, 4);
    for cell in mgr.network().cells() {
        assert_eq!(cell.y, 5.0);
        assert_eq!(cell.width, 40.0);
    }
}

#[test]
fn test_config_from_toml() {
    let config = FlowLegalizerConfig::from_toml_str(
        r#"
        utilization_target = 0.9
        move_limit = 2
        max_search_rounds = 50
        "#,
    )
    .unwrap();
    assert_eq!(config.utilization_target, 0.9);
    assert_eq!(config.move_limit, 2);
    assert_eq!(config.max_search_rounds, 50);
    assert_eq!(config.epsilon, FlowLegalizerConfig::default().epsilon);

    let legalizer = FlowLegalizer::new(config.clone());
    assert_eq!(legalizer.config(), &config);
}

#[test]
fn test_bad_config_from_toml() {
    let err = FlowLegalizerConfig::from_toml_str("utilization_target = 1.5").unwrap_err();
    assert!(matches!(err, LegalizerError::Config(_)));

    let err = FlowLegalizerConfig::from_toml_str("move_limit = \"many\"").unwrap_err();
    assert!(matches!(err, LegalizerError::Config(_)));
}
