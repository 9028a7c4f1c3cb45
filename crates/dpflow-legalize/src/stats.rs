//! Width statistics of the cells being legalized

use serde::{Deserialize, Serialize};

/// Min/max/average/median width of single-height cells
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CellWidthStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub median: f64,
    pub count: usize,
}

impl CellWidthStats {
    pub fn from_widths(widths: impl IntoIterator<Item = f64>) -> Self {
        let mut widths: Vec<f64> = widths.into_iter().collect();
        if widths.is_empty() {
            return Self::default();
        }
        widths.sort_by(f64::total_cmp);

        let count = widths.len();
        Self {
            min: widths[0],
            max: widths[count - 1],
            avg: widths.iter().sum::<f64>() / count as f64,
            median: widths[count / 2],
            count,
        }
    }

    /// Starting bin width: wide enough for the widest cell plus slack, or a
    /// few median cells, scaled up by the utilization target.
    pub fn initial_bin_width(&self, utilization_target: f64, tolerance: f64) -> f64 {
        ((1.1 * self.max).max(tolerance * self.median) / utilization_target).ceil()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_stats() {
        let stats = CellWidthStats::from_widths([4.0, 2.0, 8.0, 6.0]);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 8.0);
        assert_eq!(stats.avg, 5.0);
        assert_eq!(stats.median, 6.0);
        assert_eq!(stats.count, 4);
    }

    #[test]
    fn test_initial_bin_width() {
        // Dominated by the median term.
        let stats = CellWidthStats::from_widths([4.0, 4.0, 5.0]);
        assert_eq!(stats.initial_bin_width(1.0, 3.0), 12.0);
        // Dominated by the widest cell.
        let stats = CellWidthStats::from_widths([40.0, 40.0, 40.0]);
        assert_eq!(stats.initial_bin_width(1.0, 1.0), 44.0);
        assert_eq!(stats.initial_bin_width(0.5, 1.0), 88.0);
    }

    #[test]
    fn test_empty_stats() {
        let stats = CellWidthStats::from_widths(std::iter::empty());
        assert_eq!(stats.count, 0);
    }
}
