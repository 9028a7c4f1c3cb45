//! dpflow placement database
//!
//! Data model shared by the detailed-placement passes:
//! - Architecture: rows, sites, regions and cell padding
//! - Network: movable and fixed cells
//! - Segments: contiguous placeable intervals of each row and their cell lists

pub mod architecture;
pub mod error;
pub mod network;
pub mod segment;

pub use architecture::{Architecture, Rect, Region, Row};
pub use error::{DbError, Result};
pub use network::{Cell, Network};
pub use segment::{Segment, SegmentManager};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerance used for coordinate comparisons
pub const COORD_EPS: f64 = 1.0e-3;

/// Unique identifier for a cell in the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellId(pub u32);

/// Unique identifier for a row segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentId(pub u32);

/// Unique identifier for a placement region. Region 0 is the default region.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct RegionId(pub u32);

impl CellId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl SegmentId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl RegionId {
    /// The region every cell belongs to unless constrained otherwise
    pub const DEFAULT: RegionId = RegionId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell {}", self.0)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "segment {}", self.0)
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region {}", self.0)
    }
}
