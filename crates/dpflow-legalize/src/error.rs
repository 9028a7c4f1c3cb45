//! Error types for flow legalization

use crate::bin::BinId;
use dpflow_db::{CellId, DbError, SegmentId};
use std::fmt;
use thiserror::Error;

/// Result type for legalizer operations
pub type Result<T> = std::result::Result<T, LegalizerError>;

/// Internal bookkeeping went out of sync.
///
/// Mutations committed before the violation was detected are not rolled back.
#[derive(Debug, Clone, PartialEq)]
pub struct LegalizationInvariantError {
    pub message: String,
    pub bin: Option<BinId>,
    pub cell: Option<CellId>,
}

impl LegalizationInvariantError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            bin: None,
            cell: None,
        }
    }

    pub fn with_bin(mut self, bin: BinId) -> Self {
        self.bin = Some(bin);
        self
    }

    pub fn with_cell(mut self, cell: CellId) -> Self {
        self.cell = Some(cell);
        self
    }
}

impl fmt::Display for LegalizationInvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(bin) = self.bin {
            write!(f, " ({})", bin)?;
        }
        if let Some(cell) = self.cell {
            write!(f, " ({})", cell)?;
        }
        Ok(())
    }
}

impl std::error::Error for LegalizationInvariantError {}

/// Errors that can occur during legalization
#[derive(Debug, Error)]
pub enum LegalizerError {
    /// Cell-to-bin bookkeeping is inconsistent
    #[error("Legalization invariant violated: {0}")]
    Invariant(#[from] LegalizationInvariantError),

    /// A segment holding single-height cells has no bin to put them in
    #[error("No feasible bin for cells of {segment}")]
    NoFeasibleBin { segment: SegmentId },

    /// A cell is still split between bins that cannot share it
    #[error("Unresolved fractional assignment of {cell} between {first} and {second}")]
    UnresolvedFractional {
        cell: CellId,
        first: BinId,
        second: BinId,
    },

    /// A segment manager operation failed
    #[error("Segment error: {0}")]
    Segment(#[from] DbError),

    /// Invalid or unreadable configuration
    #[error("Invalid legalizer configuration: {0}")]
    Config(String),
}

impl LegalizerError {
    /// Shorthand for an invariant violation without bin or cell context
    pub fn invariant(message: impl Into<String>) -> Self {
        LegalizerError::Invariant(LegalizationInvariantError::new(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invariant_display_includes_context() {
        let err = LegalizationInvariantError::new("cell missing from bin")
            .with_bin(BinId(4))
            .with_cell(CellId(9));
        assert_eq!(err.to_string(), "cell missing from bin (bin 4) (cell 9)");

        let wrapped: LegalizerError = err.into();
        assert!(wrapped.to_string().starts_with("Legalization invariant violated"));
    }

    #[test]
    fn test_db_error_converts() {
        let err: LegalizerError = DbError::UnknownCell(CellId(3)).into();
        assert!(matches!(err, LegalizerError::Segment(_)));
    }
}
