//! Error types for placement database operations

use crate::{CellId, RegionId, SegmentId};
use thiserror::Error;

/// Errors raised by the placement database
#[derive(Debug, Error)]
pub enum DbError {
    /// The architecture has no rows
    #[error("Architecture has no placement rows")]
    NoRows,

    /// Rows must share a single height for single-height legalization
    #[error("Row {row} has height {height}, expected {expected}")]
    InconsistentRowHeight {
        row: usize,
        height: f64,
        expected: f64,
    },

    /// Unknown cell identifier
    #[error("Unknown {0}")]
    UnknownCell(CellId),

    /// Unknown segment identifier
    #[error("Unknown {0}")]
    UnknownSegment(SegmentId),

    /// Unknown region identifier
    #[error("Unknown {0}")]
    UnknownRegion(RegionId),

    /// A cell was expected in a segment but is not there
    #[error("Unable to find {cell} in expected {segment}")]
    CellNotInSegment { cell: CellId, segment: SegmentId },

    /// A cell is already recorded in the segment
    #[error("{cell} already present in {segment}")]
    CellAlreadyInSegment { cell: CellId, segment: SegmentId },

    /// A cell is recorded in more segments than the rows it spans
    #[error("{cell} spans {spanned} rows but would be in {count} segments")]
    TooManySegments {
        cell: CellId,
        spanned: usize,
        count: usize,
    },

    /// No segment of the cell's region can host the cell
    #[error("No segment in {region} can host {cell}")]
    NoSegmentForCell { cell: CellId, region: RegionId },
}

/// Result type for placement database operations
pub type Result<T> = std::result::Result<T, DbError>;
