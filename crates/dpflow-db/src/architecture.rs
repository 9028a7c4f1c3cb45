//! Placement architecture: rows, sites and regions

use crate::error::{DbError, Result};
use crate::network::Cell;
use crate::{RegionId, COORD_EPS};
use serde::{Deserialize, Serialize};

/// A placement row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Bottom edge of the row
    pub y: f64,
    /// Row height
    pub height: f64,
    /// Width of a single site
    pub site_width: f64,
    /// Pitch between site origins
    pub site_spacing: f64,
    /// X coordinate of the first site
    pub sub_row_origin: f64,
    /// Number of sites in the row
    pub num_sites: usize,
}

impl Row {
    /// Create a row with abutting sites
    pub fn new(y: f64, height: f64, site_width: f64, origin: f64, num_sites: usize) -> Self {
        Self {
            y,
            height,
            site_width,
            site_spacing: site_width,
            sub_row_origin: origin,
            num_sites,
        }
    }

    pub fn min_x(&self) -> f64 {
        self.sub_row_origin
    }

    pub fn max_x(&self) -> f64 {
        self.sub_row_origin + self.num_sites as f64 * self.site_spacing
    }

    pub fn top(&self) -> f64 {
        self.y + self.height
    }

    pub fn center_y(&self) -> f64 {
        self.y + 0.5 * self.height
    }

    /// Snap `x` down to the nearest site boundary of this row
    pub fn snap_down(&self, x: f64) -> f64 {
        let ix = ((x - self.sub_row_origin) / self.site_spacing).floor();
        self.sub_row_origin + ix * self.site_spacing
    }

    /// Snap `x` up to the nearest site boundary of this row
    pub fn snap_up(&self, x: f64) -> f64 {
        let ix = ((x - self.sub_row_origin) / self.site_spacing).ceil();
        self.sub_row_origin + ix * self.site_spacing
    }
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Rect {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// True if the rectangle covers the full height of `row`
    pub fn covers_row(&self, row: &Row) -> bool {
        self.ymin <= row.y + COORD_EPS && self.ymax >= row.top() - COORD_EPS
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }
}

/// A fence region built from one or more rectangles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub rects: Vec<Rect>,
}

/// The placement area
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Architecture {
    rows: Vec<Row>,
    regions: Vec<Region>,
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl Architecture {
    /// Build an architecture from rows sorted bottom to top.
    ///
    /// Region 0 is created automatically and spans the whole chip.
    pub fn new(mut rows: Vec<Row>) -> Result<Self> {
        if rows.is_empty() {
            return Err(DbError::NoRows);
        }
        rows.sort_by(|a, b| a.y.total_cmp(&b.y));

        let expected = rows[0].height;
        for (i, row) in rows.iter().enumerate() {
            if (row.height - expected).abs() > COORD_EPS {
                return Err(DbError::InconsistentRowHeight {
                    row: i,
                    height: row.height,
                    expected,
                });
            }
        }

        let xmin = rows.iter().map(Row::min_x).fold(f64::INFINITY, f64::min);
        let xmax = rows.iter().map(Row::max_x).fold(f64::NEG_INFINITY, f64::max);
        let ymin = rows[0].y;
        let ymax = rows[rows.len() - 1].top();

        Ok(Self {
            regions: vec![Region {
                id: RegionId::DEFAULT,
                rects: vec![Rect::new(xmin, ymin, xmax, ymax)],
            }],
            rows,
            xmin,
            xmax,
            ymin,
            ymax,
        })
    }

    /// Build `num_rows` identical abutting rows starting at the origin
    pub fn uniform(num_rows: usize, num_sites: usize, row_height: f64, site_width: f64) -> Result<Self> {
        let rows = (0..num_rows)
            .map(|r| Row::new(r as f64 * row_height, row_height, site_width, 0.0, num_sites))
            .collect();
        Self::new(rows)
    }

    /// Add a fence region and return its id
    pub fn add_region(&mut self, rects: Vec<Rect>) -> RegionId {
        let id = RegionId(self.regions.len() as u32);
        self.regions.push(Region { id, rects });
        id
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> &Row {
        &self.rows[index]
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, id: RegionId) -> Result<&Region> {
        self.regions.get(id.index()).ok_or(DbError::UnknownRegion(id))
    }

    /// Height shared by all single-height rows
    pub fn row_height(&self) -> f64 {
        self.rows[0].height
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Index of the row whose span is closest to `y`
    pub fn nearest_row(&self, y: f64) -> usize {
        let r = ((y - self.ymin) / self.row_height()).floor();
        r.clamp(0.0, (self.rows.len() - 1) as f64) as usize
    }

    /// Rows whose vertical span overlaps `[ymin, ymax]` by more than `COORD_EPS`
    pub fn rows_overlapping(&self, ymin: f64, ymax: f64) -> impl Iterator<Item = usize> + '_ {
        self.rows
            .iter()
            .enumerate()
            .filter(move |(_, row)| !(ymax - COORD_EPS <= row.y || ymin + COORD_EPS >= row.top()))
            .map(|(r, _)| r)
    }

    /// Required spacing between two abutting cells; either side may be the row edge
    pub fn cell_spacing(&self, left: Option<&Cell>, right: Option<&Cell>) -> f64 {
        let lpad = left.map_or(0.0, |c| c.padding_right);
        let rpad = right.map_or(0.0, |c| c.padding_left);
        lpad + rpad
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_architecture_bounds() {
        let arch = Architecture::uniform(4, 100, 10.0, 1.0).unwrap();
        assert_eq!(arch.num_rows(), 4);
        assert_eq!(arch.width(), 100.0);
        assert_eq!(arch.height(), 40.0);
        assert_eq!(arch.regions().len(), 1);
        assert_eq!(arch.nearest_row(25.0), 2);
        assert_eq!(arch.nearest_row(-5.0), 0);
        assert_eq!(arch.nearest_row(500.0), 3);
    }

    #[test]
    fn test_rows_must_share_height() {
        let rows = vec![
            Row::new(0.0, 10.0, 1.0, 0.0, 10),
            Row::new(10.0, 12.0, 1.0, 0.0, 10),
        ];
        assert!(matches!(
            Architecture::new(rows),
            Err(DbError::InconsistentRowHeight { row: 1, .. })
        ));
        assert!(matches!(Architecture::new(Vec::new()), Err(DbError::NoRows)));
    }

    #[test]
    fn test_rows_overlapping_ignores_touching_rows() {
        let arch = Architecture::uniform(4, 100, 10.0, 1.0).unwrap();
        let rows: Vec<usize> = arch.rows_overlapping(10.0, 30.0).collect();
        assert_eq!(rows, vec![1, 2]);
        let rows: Vec<usize> = arch.rows_overlapping(5.0, 10.5).collect();
        assert_eq!(rows, vec![0, 1]);
    }

    #[test]
    fn test_site_snapping() {
        let mut row = Row::new(0.0, 10.0, 2.0, 1.0, 10);
        row.site_spacing = 2.0;
        assert_eq!(row.snap_down(4.5), 3.0);
        assert_eq!(row.snap_up(4.5), 5.0);
        assert_eq!(row.max_x(), 21.0);
    }

    #[test]
    fn test_cell_spacing_uses_padding() {
        let arch = Architecture::uniform(1, 10, 10.0, 1.0).unwrap();
        let a = Cell::new(crate::CellId(0), 2.0, 5.0, 2.0, 10.0).with_padding(0.0, 1.0);
        let b = Cell::new(crate::CellId(1), 6.0, 5.0, 2.0, 10.0).with_padding(2.0, 0.0);
        assert_eq!(arch.cell_spacing(Some(&a), Some(&b)), 3.0);
        assert_eq!(arch.cell_spacing(None, Some(&b)), 2.0);
        assert_eq!(arch.cell_spacing(Some(&a), None), 1.0);
    }
}
