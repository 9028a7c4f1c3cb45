//! Bin graph
//!
//! Bins are fixed-width pieces of segments. Each bin keeps its capacity and
//! the cell area assigned to it; edges connect bins that may exchange cells.

use dpflow_db::{RegionId, SegmentId};
use std::fmt;

/// Unique identifier for a bin, stable for the lifetime of a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BinId(pub u32);

impl BinId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bin {}", self.0)
    }
}

/// A horizontal slice of a segment that holds cell area
#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    pub id: BinId,
    pub row: usize,
    pub segment: SegmentId,
    pub region: RegionId,
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    /// Utilization target
    pub ut: f64,
    /// Cell area currently assigned
    pub occupancy: f64,
    /// Cleared when the bin is absorbed by a merge
    pub alive: bool,
}

impl Bin {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn center_x(&self) -> f64 {
        0.5 * (self.min_x + self.max_x)
    }

    pub fn center_y(&self) -> f64 {
        0.5 * (self.min_y + self.max_y)
    }

    pub fn capacity(&self) -> f64 {
        self.ut * self.width()
    }

    /// Whole units of spare capacity
    pub fn spare(&self) -> f64 {
        (self.capacity() - self.occupancy).max(0.0).floor()
    }

    pub fn is_overfull(&self, eps: f64) -> bool {
        self.occupancy >= self.capacity() + eps
    }
}

/// Directed edge to a neighbouring bin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub to: BinId,
    /// Manhattan distance between the bin centres
    pub cost: f64,
}

/// Bins with their adjacency and per-row / per-segment indexes
#[derive(Debug, Clone, Default)]
pub struct BinGraph {
    bins: Vec<Bin>,
    out_edges: Vec<Vec<Edge>>,
    /// Alive bins of each row, left to right
    pub(crate) bins_in_row: Vec<Vec<BinId>>,
    /// Alive bins of each segment, left to right
    pub(crate) bins_in_seg: Vec<Vec<BinId>>,
}

impl BinGraph {
    pub fn new(num_rows: usize, num_segments: usize) -> Self {
        Self {
            bins: Vec::new(),
            out_edges: Vec::new(),
            bins_in_row: vec![Vec::new(); num_rows],
            bins_in_seg: vec![Vec::new(); num_segments],
        }
    }

    /// Append a bin. Its id is reassigned to its index, and it must lie to the
    /// right of every bin already in its row and segment.
    pub fn add_bin(&mut self, mut bin: Bin) -> BinId {
        let id = BinId(self.bins.len() as u32);
        bin.id = id;
        bin.alive = true;
        self.bins_in_row[bin.row].push(id);
        self.bins_in_seg[bin.segment.index()].push(id);
        self.bins.push(bin);
        self.out_edges.push(Vec::new());
        id
    }

    pub fn bin(&self, id: BinId) -> &Bin {
        &self.bins[id.index()]
    }

    pub fn bin_mut(&mut self, id: BinId) -> &mut Bin {
        &mut self.bins[id.index()]
    }

    /// Total number of bins ever created, including absorbed ones
    pub fn num_bins(&self) -> usize {
        self.bins.len()
    }

    pub fn alive_bins(&self) -> impl Iterator<Item = &Bin> + '_ {
        self.bins.iter().filter(|b| b.alive)
    }

    pub fn num_alive(&self) -> usize {
        self.alive_bins().count()
    }

    pub fn edges(&self, id: BinId) -> &[Edge] {
        &self.out_edges[id.index()]
    }

    pub(crate) fn edges_mut(&mut self, id: BinId) -> &mut Vec<Edge> {
        &mut self.out_edges[id.index()]
    }

    pub fn num_rows(&self) -> usize {
        self.bins_in_row.len()
    }

    pub fn bins_in_row(&self, row: usize) -> &[BinId] {
        self.bins_in_row.get(row).map_or(&[], Vec::as_slice)
    }

    pub fn bins_in_segment(&self, segment: SegmentId) -> &[BinId] {
        self.bins_in_seg
            .get(segment.index())
            .map_or(&[], Vec::as_slice)
    }

    /// Alive bins holding more area than they can take, in id order
    pub fn overfilled(&self, eps: f64) -> Vec<BinId> {
        self.alive_bins()
            .filter(|b| b.is_overfull(eps))
            .map(|b| b.id)
            .collect()
    }

    pub fn count_overfilled(&self, eps: f64) -> usize {
        self.alive_bins().filter(|b| b.is_overfull(eps)).count()
    }

    /// Whether `a` and `b` abut within the same segment
    pub fn adjacent(&self, a: BinId, b: BinId, eps: f64) -> bool {
        let (a, b) = (self.bin(a), self.bin(b));
        if a.row != b.row || a.region != b.region || a.segment != b.segment {
            return false;
        }
        (b.max_x - a.min_x).abs() < eps || (a.max_x - b.min_x).abs() < eps
    }

    /// Drop absorbed bins from the row and segment indexes
    pub fn remove_dead(&mut self) {
        let bins = &self.bins;
        for list in self.bins_in_row.iter_mut().chain(self.bins_in_seg.iter_mut()) {
            list.retain(|id| bins[id.index()].alive);
        }
    }
}
