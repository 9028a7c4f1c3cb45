//! Row segments and the cells placed in them
//!
//! A segment is a site-aligned interval of a row that is free of fixed
//! obstacles and belongs to a single region. The manager keeps each segment's
//! cell list sorted by x, together with:
//! - `util`: total width of the cells in the segment
//! - `gap_util`: total padding required between neighbouring cells

use crate::architecture::{Architecture, Region, Row};
use crate::error::{DbError, Result};
use crate::network::{Cell, Network};
use crate::{CellId, RegionId, SegmentId, COORD_EPS};
use serde::{Deserialize, Serialize};

/// A placeable interval of one row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    /// Index of the row this segment belongs to
    pub row: usize,
    pub region: RegionId,
    pub min_x: f64,
    pub max_x: f64,
    /// Total width of the cells in the segment
    pub util: f64,
    /// Total spacing required between neighbouring cells
    pub gap_util: f64,
}

impl Segment {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn center_x(&self) -> f64 {
        0.5 * (self.min_x + self.max_x)
    }
}

/// Sort intervals by left edge and merge any that touch or overlap
pub fn merge_intervals(mut intervals: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    intervals.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    let mut merged: Vec<(f64, f64)> = Vec::with_capacity(intervals.len());
    for (lo, hi) in intervals {
        match merged.last_mut() {
            Some(top) if top.1 >= lo => top.1 = top.1.max(hi),
            _ => merged.push((lo, hi)),
        }
    }
    merged
}

/// Free interval of a row before ids are assigned
#[derive(Debug, Clone, Copy)]
struct Span {
    min_x: f64,
    max_x: f64,
    region: RegionId,
}

/// Best candidate found while scanning rows for a cell
#[derive(Debug, Clone, Copy)]
struct Candidate {
    segment: SegmentId,
    dist: f64,
}

/// Owns the placement database and the cell-to-segment bookkeeping
#[derive(Debug, Clone)]
pub struct SegmentManager {
    arch: Architecture,
    network: Network,
    segments: Vec<Segment>,
    segs_in_row: Vec<Vec<SegmentId>>,
    cells_in_seg: Vec<Vec<CellId>>,
    /// Segments each cell is recorded in; multi-height cells have one per row
    reverse: Vec<Vec<SegmentId>>,
    single_height: Vec<CellId>,
    multi_height: Vec<CellId>,
    fixed: Vec<CellId>,
}

impl SegmentManager {
    /// Build segments from the architecture and fixed cells, then snap every
    /// movable cell into its closest segment.
    pub fn new(arch: Architecture, network: Network) -> Result<Self> {
        let mut mgr = Self {
            arch,
            network,
            segments: Vec::new(),
            segs_in_row: Vec::new(),
            cells_in_seg: Vec::new(),
            reverse: Vec::new(),
            single_height: Vec::new(),
            multi_height: Vec::new(),
            fixed: Vec::new(),
        };
        mgr.collect_cells();
        mgr.find_segments();
        mgr.assign_cells_to_segments()?;
        Ok(mgr)
    }

    pub fn architecture(&self) -> &Architecture {
        &self.arch
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Mutable access to cells. Moving a cell does not update segment order;
    /// call `resort_segments` afterwards.
    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    pub fn cell(&self, id: CellId) -> Result<&Cell> {
        self.network.cell(id)
    }

    pub fn into_parts(self) -> (Architecture, Network) {
        (self.arch, self.network)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment(&self, id: SegmentId) -> Result<&Segment> {
        self.segments
            .get(id.index())
            .ok_or(DbError::UnknownSegment(id))
    }

    /// Segments of `row`, sorted left to right
    pub fn segments_in_row(&self, row: usize) -> &[SegmentId] {
        self.segs_in_row.get(row).map_or(&[], Vec::as_slice)
    }

    /// Cells of `segment`, sorted by x as of the last insertion or resort
    pub fn cells_in_segment(&self, segment: SegmentId) -> &[CellId] {
        self.cells_in_seg
            .get(segment.index())
            .map_or(&[], Vec::as_slice)
    }

    /// Segments `cell` is currently recorded in
    pub fn segments_of_cell(&self, cell: CellId) -> &[SegmentId] {
        self.reverse.get(cell.index()).map_or(&[], Vec::as_slice)
    }

    pub fn single_height_cells(&self) -> &[CellId] {
        &self.single_height
    }

    pub fn multi_height_cells(&self) -> &[CellId] {
        &self.multi_height
    }

    pub fn fixed_cells(&self) -> &[CellId] {
        &self.fixed
    }

    pub fn single_row_height(&self) -> f64 {
        self.arch.row_height()
    }

    pub fn num_rows(&self) -> usize {
        self.arch.num_rows()
    }

    fn collect_cells(&mut self) {
        self.single_height.clear();
        self.multi_height.clear();
        self.fixed.clear();

        let row_height = self.arch.row_height();
        for cell in self.network.cells() {
            if cell.fixed {
                self.fixed.push(cell.id);
            } else if cell.row_span(row_height) == 1 {
                self.single_height.push(cell.id);
            } else {
                self.multi_height.push(cell.id);
            }
        }
        log::info!(
            "Number of cells is {}, single height {}, multi height {}, fixed {}",
            self.network.num_cells(),
            self.single_height.len(),
            self.multi_height.len(),
            self.fixed.len()
        );
    }

    /// Merged obstacle intervals per row, from fixed cells widened by their padding
    fn find_blockages(&self) -> Vec<Vec<(f64, f64)>> {
        let mut blockages = vec![Vec::new(); self.arch.num_rows()];
        let cells = self.network.cells();
        for id in &self.fixed {
            let cell = &cells[id.index()];
            let xmin = self.arch.xmin.max(cell.left()) - self.arch.cell_spacing(None, Some(cell));
            let xmax = self.arch.xmax.min(cell.right()) + self.arch.cell_spacing(Some(cell), None);
            let ymin = self.arch.ymin.max(cell.bottom());
            let ymax = self.arch.ymax.min(cell.top());
            for r in self.arch.rows_overlapping(ymin, ymax) {
                blockages[r].push((xmin, xmax));
            }
        }
        blockages.into_iter().map(merge_intervals).collect()
    }

    /// Site-aligned intervals of each row fully covered by `region`
    fn find_region_intervals(&self, region: &Region) -> Vec<Vec<(f64, f64)>> {
        let mut intervals = vec![Vec::new(); self.arch.num_rows()];
        for rect in &region.rects {
            for (r, row) in self.arch.rows().iter().enumerate() {
                if !rect.covers_row(row) {
                    continue;
                }
                let lo = row.snap_down(rect.xmin);
                let hi = row.snap_up(rect.xmax);
                if hi > lo {
                    intervals[r].push((lo, hi));
                }
            }
        }
        intervals.into_iter().map(merge_intervals).collect()
    }

    /// Rebuild all segments. Existing cell assignments are discarded.
    pub fn find_segments(&mut self) {
        let blockages = self.find_blockages();

        let mut spans: Vec<Vec<Span>> = Vec::with_capacity(self.arch.num_rows());
        for (r, row) in self.arch.rows().iter().enumerate() {
            let lx = self.arch.xmin.max(row.min_x());
            let rx = self.arch.xmax.min(row.max_x());
            let mut free = Vec::new();
            let mut start = lx;
            for &(bl, br) in &blockages[r] {
                let end = rx.min(bl);
                if end > start {
                    free.push(Span {
                        min_x: start,
                        max_x: end,
                        region: RegionId::DEFAULT,
                    });
                }
                start = start.max(br);
            }
            if rx > start {
                free.push(Span {
                    min_x: start,
                    max_x: rx,
                    region: RegionId::DEFAULT,
                });
            }
            spans.push(free);
        }

        // Cut the free spans by each fence region; region 0 is everywhere.
        let regions = self.arch.regions().to_vec();
        for region in regions.iter().skip(1) {
            let intervals = self.find_region_intervals(region);
            for (row_spans, row_intervals) in spans.iter_mut().zip(&intervals) {
                for &(il, ir) in row_intervals {
                    split_spans(row_spans, il, ir, region.id);
                }
            }
        }

        self.segments.clear();
        self.segs_in_row = vec![Vec::new(); self.arch.num_rows()];
        for (r, mut row_spans) in spans.into_iter().enumerate() {
            let row = self.arch.row(r);
            for span in &mut row_spans {
                span.min_x = row.snap_up(span.min_x);
                span.max_x = row.snap_down(span.max_x);
            }
            row_spans.retain(|s| s.max_x - s.min_x > COORD_EPS);
            row_spans.sort_by(|a, b| a.min_x.total_cmp(&b.min_x));

            for span in row_spans {
                let id = SegmentId(self.segments.len() as u32);
                self.segments.push(Segment {
                    id,
                    row: r,
                    region: span.region,
                    min_x: span.min_x,
                    max_x: span.max_x,
                    util: 0.0,
                    gap_util: 0.0,
                });
                self.segs_in_row[r].push(id);
            }
        }

        self.cells_in_seg = vec![Vec::new(); self.segments.len()];
        self.reverse = vec![Vec::new(); self.network.num_cells()];
        log::info!("Created {} segments", self.segments.len());
    }

    fn scan_row_for_closest(
        &self,
        cell: &Cell,
        row: usize,
        vert: f64,
        best: &mut Option<Candidate>,
        best_fit: &mut Option<Candidate>,
    ) {
        for &seg_id in self.segments_in_row(row) {
            let seg = &self.segments[seg_id.index()];
            if seg.region != cell.region {
                continue;
            }
            let x1 = seg.min_x + 0.5 * cell.width;
            let x2 = seg.max_x - 0.5 * cell.width;
            let xx = cell.x.min(x2).max(x1);
            let dist = (xx - cell.x).abs() + vert;

            if best.map_or(true, |b| dist < b.dist) {
                *best = Some(Candidate {
                    segment: seg_id,
                    dist,
                });
            }
            let fits = cell.width <= seg.width();
            if fits && best_fit.map_or(true, |b| dist < b.dist) {
                *best_fit = Some(Candidate {
                    segment: seg_id,
                    dist,
                });
            }
        }
    }

    /// Closest segment of the cell's region, preferring segments wide enough
    /// to hold it. Rows are scanned outward from the cell's row.
    pub fn find_closest_segment(&self, cell: &Cell) -> Option<SegmentId> {
        let row = self.arch.nearest_row(cell.y);
        let num_rows = self.arch.num_rows();
        let row_height = self.arch.row_height();

        let mut best = None;
        let mut best_fit = None;
        self.scan_row_for_closest(cell, row, 0.0, &mut best, &mut best_fit);

        let could_improve = |vert: f64, best: &Option<Candidate>, best_fit: &Option<Candidate>| {
            vert <= best.map_or(f64::INFINITY, |b| b.dist)
                || vert <= best_fit.map_or(f64::INFINITY, |b| b.dist)
        };

        for offset in 1..num_rows {
            let vert = offset as f64 * row_height;
            if !could_improve(vert, &best, &best_fit) {
                break;
            }
            if offset <= row {
                self.scan_row_for_closest(cell, row - offset, vert, &mut best, &mut best_fit);
            }
            if row + offset < num_rows && could_improve(vert, &best, &best_fit) {
                self.scan_row_for_closest(cell, row + offset, vert, &mut best, &mut best_fit);
            }
        }

        best_fit.or(best).map(|c| c.segment)
    }

    fn clear_cell_assignments(&mut self) {
        for list in &mut self.cells_in_seg {
            list.clear();
        }
        for segs in &mut self.reverse {
            segs.clear();
        }
        for seg in &mut self.segments {
            seg.util = 0.0;
            seg.gap_util = 0.0;
        }
    }

    /// Snap each movable cell into the closest segment(s) of its region and
    /// record it there. Multi-height cells are recorded in one segment per
    /// spanned row.
    pub fn assign_cells_to_segments(&mut self) -> Result<()> {
        self.clear_cell_assignments();

        let mut moved_x = 0.0;
        let mut moved_y = 0.0;

        for id in self.single_height.clone() {
            let cell = self.network.cell(id)?.clone();
            let seg_id = self
                .find_closest_segment(&cell)
                .ok_or(DbError::NoSegmentForCell {
                    cell: id,
                    region: cell.region,
                })?;
            let seg = &self.segments[seg_id.index()];
            let row = self.arch.row(seg.row);
            let xx = cell
                .x
                .min(seg.max_x - 0.5 * cell.width)
                .max(seg.min_x + 0.5 * cell.width);
            let yy = row.y + 0.5 * cell.height;
            moved_x += (cell.x - xx).abs();
            moved_y += (cell.y - yy).abs();

            let c = self.network.cell_mut(id)?;
            c.x = xx;
            c.y = yy;
            self.add_cell_to_segment(id, seg_id)?;
        }

        for id in self.multi_height.clone() {
            let cell = self.network.cell(id)?.clone();
            let (chosen, bottom) = self.find_closest_span_of_segments(&cell)?;

            let xmin = chosen
                .iter()
                .map(|s| self.segments[s.index()].min_x)
                .fold(f64::NEG_INFINITY, f64::max);
            let xmax = chosen
                .iter()
                .map(|s| self.segments[s.index()].max_x)
                .fold(f64::INFINITY, f64::min);
            let xx = cell
                .x
                .min(xmax - 0.5 * cell.width)
                .max(xmin + 0.5 * cell.width);
            let yy = self.arch.row(bottom).y + 0.5 * cell.height;
            moved_x += (cell.x - xx).abs();
            moved_y += (cell.y - yy).abs();

            let c = self.network.cell_mut(id)?;
            c.x = xx;
            c.y = yy;
            for seg_id in chosen {
                self.add_cell_to_segment(id, seg_id)?;
            }
        }

        log::info!(
            "Assigned {} cells into segments, movement in X is {:.1}, movement in Y is {:.1}",
            self.single_height.len() + self.multi_height.len(),
            moved_x,
            moved_y
        );
        Ok(())
    }

    /// Stack of segments, one per spanned row, closest to a multi-height cell
    fn find_closest_span_of_segments(&self, cell: &Cell) -> Result<(Vec<SegmentId>, usize)> {
        let row_height = self.arch.row_height();
        let num_rows = self.arch.num_rows();
        let span = cell.row_span(row_height);
        let no_segment = DbError::NoSegmentForCell {
            cell: cell.id,
            region: cell.region,
        };
        if span > num_rows {
            return Err(no_segment);
        }

        let bottom = ((cell.bottom() - self.arch.ymin) / row_height)
            .round()
            .clamp(0.0, (num_rows - span) as f64) as usize;

        let mut chosen = Vec::with_capacity(span);
        for r in bottom..bottom + span {
            let seg = self
                .segments_in_row(r)
                .iter()
                .map(|&s| &self.segments[s.index()])
                .filter(|s| s.region == cell.region)
                .min_by(|a, b| {
                    let da = (cell.x.clamp(a.min_x, a.max_x) - cell.x).abs();
                    let db = (cell.x.clamp(b.min_x, b.max_x) - cell.x).abs();
                    da.total_cmp(&db)
                });
            match seg {
                Some(s) => chosen.push(s.id),
                None => return Err(no_segment),
            }
        }
        Ok((chosen, bottom))
    }

    fn spacing_between(&self, left: CellId, right: CellId) -> f64 {
        let cells = self.network.cells();
        self.arch
            .cell_spacing(cells.get(left.index()), cells.get(right.index()))
    }

    /// Remove `cell` from `segment`, updating utilization and required gaps
    pub fn remove_cell_from_segment(&mut self, cell: CellId, segment: SegmentId) -> Result<()> {
        let list = self
            .cells_in_seg
            .get(segment.index())
            .ok_or(DbError::UnknownSegment(segment))?;
        let ix = list
            .iter()
            .position(|&c| c == cell)
            .ok_or(DbError::CellNotInSegment { cell, segment })?;
        let rpos = self
            .reverse
            .get(cell.index())
            .and_then(|segs| segs.iter().position(|&s| s == segment))
            .ok_or(DbError::CellNotInSegment { cell, segment })?;

        let prev = ix.checked_sub(1).map(|i| list[i]);
        let next = list.get(ix + 1).copied();
        let curr_gap = prev.map_or(0.0, |p| self.spacing_between(p, cell))
            + next.map_or(0.0, |n| self.spacing_between(cell, n));
        let next_gap = match (prev, next) {
            (Some(p), Some(n)) => self.spacing_between(p, n),
            _ => 0.0,
        };
        let width = self.network.cell(cell)?.width;

        self.cells_in_seg[segment.index()].remove(ix);
        self.reverse[cell.index()].remove(rpos);
        let seg = &mut self.segments[segment.index()];
        seg.util -= width;
        seg.gap_util += next_gap - curr_gap;
        Ok(())
    }

    /// Insert `cell` into the sorted cell list of `segment`
    pub fn add_cell_to_segment(&mut self, cell: CellId, segment: SegmentId) -> Result<()> {
        let c = self.network.cell(cell)?;
        let (x, width, region) = (c.x, c.width, c.region);
        let spanned = c.row_span(self.arch.row_height());

        let seg = self.segment(segment)?;
        if seg.region != region {
            log::warn!(
                "Assignment of {} in {} spanning {} rows to {} of {}",
                cell, region, spanned, segment, seg.region
            );
        }

        let recorded = self
            .reverse
            .get(cell.index())
            .ok_or(DbError::UnknownCell(cell))?;
        if recorded.contains(&segment) {
            return Err(DbError::CellAlreadyInSegment { cell, segment });
        }
        if recorded.len() >= spanned {
            return Err(DbError::TooManySegments {
                cell,
                spanned,
                count: recorded.len() + 1,
            });
        }

        let cells = self.network.cells();
        let list = &self.cells_in_seg[segment.index()];
        let ix = list.partition_point(|c| cells[c.index()].x < x);
        let prev = ix.checked_sub(1).map(|i| list[i]);
        let next = list.get(ix).copied();

        let curr_gap = match (prev, next) {
            (Some(p), Some(n)) => self.spacing_between(p, n),
            _ => 0.0,
        };
        let next_gap = prev.map_or(0.0, |p| self.spacing_between(p, cell))
            + next.map_or(0.0, |n| self.spacing_between(cell, n));

        self.cells_in_seg[segment.index()].insert(ix, cell);
        self.reverse[cell.index()].push(segment);
        let seg = &mut self.segments[segment.index()];
        seg.util += width;
        seg.gap_util += next_gap - curr_gap;
        Ok(())
    }

    /// Re-sort every segment's cells by x and recompute its utilization
    pub fn resort_segments(&mut self) {
        for s in 0..self.segments.len() {
            let mut list = std::mem::take(&mut self.cells_in_seg[s]);
            let cells = self.network.cells();
            list.sort_by(|a, b| cells[a.index()].x.total_cmp(&cells[b.index()].x));

            let util = list.iter().map(|c| cells[c.index()].width).sum();
            let gap_util = list
                .windows(2)
                .map(|w| self.spacing_between(w[0], w[1]))
                .sum();

            self.cells_in_seg[s] = list;
            self.segments[s].util = util;
            self.segments[s].gap_util = gap_util;
        }
    }

    /// Remove overlap between single-height cells of each segment with a
    /// minimum shift. Multi-height cells split a segment into independent
    /// spans. `None` processes every region.
    pub fn remove_segment_overlap_single(&mut self, region: Option<RegionId>) -> Result<()> {
        let row_height = self.arch.row_height();
        for s in 0..self.segments.len() {
            let seg = &self.segments[s];
            if region.map_or(false, |r| r != seg.region) {
                continue;
            }
            let row_idx = seg.row;
            let seg_max = seg.max_x;
            let row_y = self.arch.row(row_idx).center_y();

            let mut left = seg.min_x;
            let mut right = seg_max;
            let mut nodes = Vec::new();
            for id in self.cells_in_seg[s].clone() {
                let cell = self.network.cell_mut(id)?;
                if cell.row_span(row_height) == 1 {
                    cell.y = row_y;
                    nodes.push(id);
                    continue;
                }
                let (cell_left, cell_right) = (cell.left(), cell.right());
                if !nodes.is_empty() {
                    right = cell_left;
                    self.remove_overlap_in_span(&nodes, left, right, row_idx)?;
                    nodes.clear();
                    right = seg_max;
                }
                left = cell_right;
            }
            if !nodes.is_empty() {
                self.remove_overlap_in_span(&nodes, left, right, row_idx)?;
            }
        }
        Ok(())
    }

    fn remove_overlap_in_span(
        &mut self,
        nodes: &[CellId],
        mut xmin: f64,
        mut xmax: f64,
        row_idx: usize,
    ) -> Result<()> {
        let row: Row = self.arch.row(row_idx).clone();
        let cells = self.network.cells();

        let mut nodes = nodes.to_vec();
        nodes.sort_by(|a, b| cells[a.index()].x.total_cmp(&cells[b.index()].x));

        let mut wid: Vec<f64> = nodes.iter().map(|c| cells[c.index()].width).collect();
        let total: f64 = wid.iter().sum();
        let mut util = total;
        let mut space = xmax - xmin;

        // Pull the boundaries onto sites when the cells still fit.
        if space > total {
            let x = row.snap_up(xmin);
            if xmax - x >= total + COORD_EPS && (xmin - x).abs() > COORD_EPS {
                xmin = x;
            }
            space = xmax - xmin;
        }
        if space > total {
            let x = row.snap_down(xmax);
            if x - xmin >= total + COORD_EPS && (xmax - x).abs() > COORD_EPS {
                xmax = x;
            }
            space = xmax - xmin;
        }

        for i in 1..nodes.len() {
            let gap = self.spacing_between(nodes[i - 1], nodes[i]);
            if gap != 0.0 && util + gap <= space {
                wid[i - 1] += gap;
                util += gap;
            }
        }

        let padded: f64 = wid.iter().sum();
        if padded > space {
            log::debug!(
                "Span [{:.1}, {:.1}] of row {} over capacity ({:.1} > {:.1}), scaling",
                xmin, xmax, row_idx, padded, space
            );
            let scale = space / padded;
            for w in &mut wid {
                *w *= scale;
            }
        }

        let mut earliest = Vec::with_capacity(nodes.len());
        let mut x = xmin;
        for w in &wid {
            earliest.push(x);
            x += w;
        }

        let mut llx: Vec<f64> = nodes
            .iter()
            .map(|c| row.snap_down(cells[c.index()].left()))
            .collect();
        let mut x = xmax;
        for i in (0..nodes.len()).rev() {
            llx[i] = earliest[i].max((x - wid[i]).min(llx[i]));
            x = llx[i];
        }

        for (id, left) in nodes.iter().zip(llx) {
            let cell = self.network.cell_mut(*id)?;
            cell.x = left + 0.5 * cell.width;
        }
        Ok(())
    }

    /// Count cells that overlap a neighbour or stick out of their segment
    pub fn check_overlap_in_segments(&self) -> usize {
        let cells = self.network.cells();
        let mut errors = 0;
        for (s, list) in self.cells_in_seg.iter().enumerate() {
            let seg = &self.segments[s];
            let mut sorted: Vec<&Cell> = list.iter().map(|c| &cells[c.index()]).collect();
            sorted.sort_by(|a, b| a.x.total_cmp(&b.x));

            for cell in &sorted {
                if cell.left() < seg.min_x - COORD_EPS || cell.right() > seg.max_x + COORD_EPS {
                    log::debug!("{} outside {} [{}, {}]", cell.id, seg.id, seg.min_x, seg.max_x);
                    errors += 1;
                }
            }
            for pair in sorted.windows(2) {
                if pair[0].right() > pair[1].left() + COORD_EPS {
                    log::debug!("{} overlaps {} in {}", pair[0].id, pair[1].id, seg.id);
                    errors += 1;
                }
            }
        }
        errors
    }
}

/// Carve `[il, ir]` out of the spans of one row and give it to `region`
fn split_spans(spans: &mut Vec<Span>, il: f64, ir: f64, region: RegionId) {
    let mut s = 0;
    while s < spans.len() {
        let Span {
            min_x: sl,
            max_x: sr,
            region: old,
        } = spans[s];
        s += 1;
        if ir <= sl || il >= sr {
            continue;
        }

        if il <= sl && ir >= sr {
            spans[s - 1].region = region;
        } else if il > sl && ir >= sr {
            spans[s - 1].max_x = il;
            spans.push(Span {
                min_x: il,
                max_x: sr,
                region,
            });
        } else if il <= sl {
            spans[s - 1].min_x = ir;
            spans.push(Span {
                min_x: sl,
                max_x: ir,
                region,
            });
        } else {
            spans[s - 1].max_x = il;
            spans.push(Span {
                min_x: il,
                max_x: ir,
                region,
            });
            spans.push(Span {
                min_x: ir,
                max_x: sr,
                region: old,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architecture::Rect;

    fn two_row_arch() -> Architecture {
        Architecture::uniform(2, 100, 10.0, 1.0).unwrap()
    }

    #[test]
    fn test_merge_intervals_joins_touching() {
        let merged = merge_intervals(vec![(30.0, 40.0), (0.0, 10.0), (10.0, 15.0), (35.0, 50.0)]);
        assert_eq!(merged, vec![(0.0, 15.0), (30.0, 50.0)]);
    }

    #[test]
    fn test_fixed_cell_splits_row() {
        let mut net = Network::new();
        net.add_cell(Cell::new(CellId(0), 50.0, 5.0, 20.0, 10.0).fixed());
        let mgr = SegmentManager::new(two_row_arch(), net).unwrap();

        assert_eq!(mgr.segments().len(), 3);
        let row0: Vec<(f64, f64)> = mgr
            .segments_in_row(0)
            .iter()
            .map(|&s| {
                let seg = mgr.segment(s).unwrap();
                (seg.min_x, seg.max_x)
            })
            .collect();
        assert_eq!(row0, vec![(0.0, 40.0), (60.0, 100.0)]);
        assert_eq!(mgr.segments_in_row(1).len(), 1);
        assert_eq!(mgr.fixed_cells(), &[CellId(0)]);
    }

    #[test]
    fn test_region_splits_segment() {
        let mut arch = two_row_arch();
        let fence = arch.add_region(vec![Rect::new(0.0, 0.0, 50.0, 10.0)]);
        let mut net = Network::new();
        let inside = net.add_cell(Cell::new(CellId(0), 80.0, 15.0, 4.0, 10.0).with_region(fence));
        let mgr = SegmentManager::new(arch, net).unwrap();

        let row0: Vec<&Segment> = mgr
            .segments_in_row(0)
            .iter()
            .map(|&s| mgr.segment(s).unwrap())
            .collect();
        assert_eq!(row0.len(), 2);
        assert_eq!((row0[0].min_x, row0[0].max_x, row0[0].region), (0.0, 50.0, fence));
        assert_eq!(row0[1].region, RegionId::DEFAULT);

        // The fenced cell is pulled down into the only segment of its region.
        let seg = mgr.segments_of_cell(inside)[0];
        assert_eq!(seg, row0[0].id);
        let cell = mgr.cell(inside).unwrap();
        assert_eq!(cell.x, 48.0);
        assert_eq!(cell.y, 5.0);
    }

    #[test]
    fn test_add_and_remove_track_gaps() {
        let mut net = Network::new();
        let a = net.add_cell(Cell::new(CellId(0), 10.0, 5.0, 4.0, 10.0).with_padding(1.0, 1.0));
        let b = net.add_cell(Cell::new(CellId(0), 30.0, 5.0, 4.0, 10.0).with_padding(1.0, 1.0));
        let c = net.add_cell(Cell::new(CellId(0), 20.0, 5.0, 4.0, 10.0).with_padding(1.0, 1.0));
        let mut mgr = SegmentManager::new(Architecture::uniform(1, 100, 10.0, 1.0).unwrap(), net).unwrap();

        let seg = SegmentId(0);
        assert_eq!(mgr.cells_in_segment(seg), &[a, c, b]);
        assert_eq!(mgr.segment(seg).unwrap().util, 12.0);
        assert_eq!(mgr.segment(seg).unwrap().gap_util, 4.0);

        mgr.remove_cell_from_segment(c, seg).unwrap();
        assert_eq!(mgr.cells_in_segment(seg), &[a, b]);
        assert_eq!(mgr.segment(seg).unwrap().util, 8.0);
        assert_eq!(mgr.segment(seg).unwrap().gap_util, 2.0);
        assert!(mgr.segments_of_cell(c).is_empty());

        assert!(matches!(
            mgr.remove_cell_from_segment(c, seg),
            Err(DbError::CellNotInSegment { .. })
        ));

        mgr.add_cell_to_segment(c, seg).unwrap();
        assert_eq!(mgr.cells_in_segment(seg), &[a, c, b]);
        assert_eq!(mgr.segment(seg).unwrap().gap_util, 4.0);
        assert!(matches!(
            mgr.add_cell_to_segment(c, seg),
            Err(DbError::CellAlreadyInSegment { .. })
        ));
    }

    #[test]
    fn test_closest_segment_prefers_fitting_segment() {
        let mut net = Network::new();
        // Two fixed blocks leave a 5-wide hole around x = 52 in row 0.
        net.add_cell(Cell::new(CellId(0), 25.0, 5.0, 50.0, 10.0).fixed());
        net.add_cell(Cell::new(CellId(0), 77.5, 5.0, 45.0, 10.0).fixed());
        let wide = net.add_cell(Cell::new(CellId(0), 52.0, 5.0, 8.0, 10.0));
        let mgr = SegmentManager::new(two_row_arch(), net).unwrap();

        let seg = mgr.segment(mgr.segments_of_cell(wide)[0]).unwrap();
        assert_eq!(seg.row, 1);
        assert_eq!(mgr.cell(wide).unwrap().y, 15.0);
    }

    #[test]
    fn test_resort_segments_restores_order() {
        let mut net = Network::new();
        let a = net.add_cell(Cell::new(CellId(0), 10.0, 5.0, 4.0, 10.0));
        let b = net.add_cell(Cell::new(CellId(0), 30.0, 5.0, 4.0, 10.0));
        let mut mgr = SegmentManager::new(Architecture::uniform(1, 100, 10.0, 1.0).unwrap(), net).unwrap();

        mgr.network_mut().cell_mut(a).unwrap().x = 50.0;
        mgr.resort_segments();
        assert_eq!(mgr.cells_in_segment(SegmentId(0)), &[b, a]);
        assert_eq!(mgr.segment(SegmentId(0)).unwrap().util, 8.0);
    }

    #[test]
    fn test_remove_segment_overlap_single() {
        let mut net = Network::new();
        for x in [20.0, 22.0, 24.0, 90.0] {
            net.add_cell(Cell::new(CellId(0), x, 3.0, 6.0, 10.0).with_padding(0.0, 1.0));
        }
        let mut mgr = SegmentManager::new(Architecture::uniform(1, 100, 10.0, 1.0).unwrap(), net).unwrap();
        assert!(mgr.check_overlap_in_segments() > 0);

        mgr.remove_segment_overlap_single(None).unwrap();
        assert_eq!(mgr.check_overlap_in_segments(), 0);
        for cell in mgr.network().cells() {
            assert_eq!(cell.y, 5.0);
        }
        // The isolated cell keeps its place.
        assert_eq!(mgr.cell(CellId(3)).unwrap().x, 90.0);
    }

    #[test]
    fn test_multi_height_cell_splits_overlap_spans() {
        let mut net = Network::new();
        let tall = net.add_cell(Cell::new(CellId(0), 50.0, 10.0, 10.0, 20.0));
        let left = net.add_cell(Cell::new(CellId(0), 44.0, 5.0, 6.0, 10.0));
        let right = net.add_cell(Cell::new(CellId(0), 56.0, 5.0, 6.0, 10.0));
        let mut mgr = SegmentManager::new(two_row_arch(), net).unwrap();

        assert_eq!(mgr.multi_height_cells(), &[tall]);
        assert_eq!(mgr.segments_of_cell(tall).len(), 2);

        mgr.remove_segment_overlap_single(None).unwrap();
        assert_eq!(mgr.cell(left).unwrap().right(), 45.0);
        assert_eq!(mgr.cell(right).unwrap().left(), 55.0);
        assert_eq!(mgr.cell(tall).unwrap().x, 50.0);
    }

    #[test]
    fn test_no_segment_for_region() {
        let mut arch = two_row_arch();
        let fence = arch.add_region(vec![Rect::new(0.0, 0.0, 10.0, 5.0)]);
        let mut net = Network::new();
        net.add_cell(Cell::new(CellId(0), 5.0, 5.0, 2.0, 10.0).with_region(fence));
        assert!(matches!(
            SegmentManager::new(arch, net),
            Err(DbError::NoSegmentForCell { .. })
        ));
    }
}
