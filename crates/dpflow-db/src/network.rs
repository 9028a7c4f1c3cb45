//! Cell network
//!
//! Cells are stored by centre coordinate. The original position is the
//! reference point displacement is measured from.

use crate::error::{DbError, Result};
use crate::{CellId, RegionId};
use serde::{Deserialize, Serialize};

/// A placeable cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    /// Current centre x
    pub x: f64,
    /// Current centre y
    pub y: f64,
    /// Centre x before legalization
    pub orig_x: f64,
    /// Centre y before legalization
    pub orig_y: f64,
    pub width: f64,
    pub height: f64,
    pub region: RegionId,
    pub fixed: bool,
    pub padding_left: f64,
    pub padding_right: f64,
}

impl Cell {
    pub fn new(id: CellId, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id,
            x,
            y,
            orig_x: x,
            orig_y: y,
            width,
            height,
            region: RegionId::DEFAULT,
            fixed: false,
            padding_left: 0.0,
            padding_right: 0.0,
        }
    }

    pub fn with_region(mut self, region: RegionId) -> Self {
        self.region = region;
        self
    }

    pub fn with_padding(mut self, left: f64, right: f64) -> Self {
        self.padding_left = left;
        self.padding_right = right;
        self
    }

    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    pub fn left(&self) -> f64 {
        self.x - 0.5 * self.width
    }

    pub fn right(&self) -> f64 {
        self.x + 0.5 * self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y - 0.5 * self.height
    }

    pub fn top(&self) -> f64 {
        self.y + 0.5 * self.height
    }

    /// Number of rows this cell spans
    pub fn row_span(&self, row_height: f64) -> usize {
        (self.height / row_height).round().max(1.0) as usize
    }

    /// Manhattan distance from the original position
    pub fn displacement(&self) -> f64 {
        (self.x - self.orig_x).abs() + (self.y - self.orig_y).abs()
    }
}

/// Collection of cells indexed by `CellId`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Network {
    cells: Vec<Cell>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cell; its id is reassigned to its index
    pub fn add_cell(&mut self, mut cell: Cell) -> CellId {
        let id = CellId(self.cells.len() as u32);
        cell.id = id;
        self.cells.push(cell);
        id
    }

    pub fn cell(&self, id: CellId) -> Result<&Cell> {
        self.cells.get(id.index()).ok_or(DbError::UnknownCell(id))
    }

    pub fn cell_mut(&mut self, id: CellId) -> Result<&mut Cell> {
        self.cells.get_mut(id.index()).ok_or(DbError::UnknownCell(id))
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Record the current positions as the reference for displacement
    pub fn set_original_positions(&mut self) {
        for cell in &mut self.cells {
            cell.orig_x = cell.x;
            cell.orig_y = cell.y;
        }
    }

    /// Sum of displacement over movable cells
    pub fn total_displacement(&self) -> f64 {
        self.cells
            .iter()
            .filter(|c| !c.fixed)
            .map(Cell::displacement)
            .sum()
    }
}
