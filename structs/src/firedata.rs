//! Predicted fire behaviour over the planning raster: per-cell ignition time
//! and the time at which the front has passed.

use ordered_float::OrderedFloat;

use crate::error::{Error, Result};
use crate::raster::{Cell, Raster};
use crate::uav::Uav;
use crate::{Position, Segment3d};

/// Search radius around a segment when snapping it onto the firefront (m).
const PROJECT_SEARCH_RADIUS: f64 = 500.0;

/// Residence time of the front in a cell with no later-igniting neighbour (s).
const DEFAULT_TRAVERSAL_TIME: f64 = 180.0;

/// Immutable fire prediction shared by a plan and all of its speculative
/// copies (wrap in `Arc`).
#[derive(Debug, Clone, PartialEq)]
pub struct FireData {
    ignitions: Raster<f64>,
    traversal: Raster<f64>,
}

impl FireData {
    pub fn new(ignitions: Raster<f64>, traversal: Raster<f64>) -> Self {
        assert!(ignitions.is_like(&traversal));
        FireData { ignitions, traversal }
    }

    /// Derive traversal-end times from the ignition raster: the front leaves
    /// a cell when its last later-igniting 8-neighbour ignites.
    pub fn from_ignitions(ignitions: Raster<f64>) -> Self {
        let mut traversal = Raster::like(&ignitions, f64::INFINITY);
        for cell in ignitions.cells() {
            let ignited = cell_time(&ignitions, cell);
            if !ignited.is_finite() {
                continue;
            }
            let latest_neighbour = ignitions
                .neighbours(cell)
                .into_iter()
                .map(|n| cell_time(&ignitions, n))
                .filter(|t| t.is_finite() && *t > ignited)
                .max_by_key(|t| OrderedFloat(*t));
            traversal.set(cell, latest_neighbour.unwrap_or(ignited + DEFAULT_TRAVERSAL_TIME));
        }
        FireData { ignitions, traversal }
    }

    pub fn ignitions(&self) -> &Raster<f64> {
        &self.ignitions
    }

    /// Time at which fire first enters `cell`; +inf if it never does.
    pub fn ignition(&self, cell: Cell) -> f64 {
        cell_time(&self.ignitions, cell)
    }

    /// Time at which the front has passed `cell`; +inf while still burning
    /// at the horizon.
    pub fn traversal_end(&self, cell: Cell) -> f64 {
        cell_time(&self.traversal, cell)
    }

    pub fn is_burning(&self, cell: Cell, t: f64) -> bool {
        self.ignition(cell) <= t && t <= self.traversal_end(cell)
    }

    /// Translate `seg` so the center of its visibility footprint lands on a
    /// cell burning at time `t`. Candidates are searched within a bounded
    /// radius of the current center; the best candidate ignites closest to
    /// `t`, ties broken by distance then by row-major cell index.
    pub fn project_on_firefront(&self, seg: &Segment3d, _uav: &Uav, t: f64) -> Result<Segment3d> {
        let center = seg.visibility_center();
        let best = self
            .candidate_cells(&center)
            .filter(|c| self.is_burning(*c, t))
            .min_by_key(|c| {
                let pos = self.ignitions.as_position(*c);
                (
                    OrderedFloat((self.ignition(*c) - t).abs()),
                    OrderedFloat(pos.dist(&center)),
                    c.y * self.ignitions.x_width + c.x,
                )
            })
            .ok_or(Error::NoProjection)?;
        let target = self.ignitions.as_position(best);
        Ok(seg.translated(target.x - center.x, target.y - center.y))
    }

    fn candidate_cells(&self, center: &Position) -> impl Iterator<Item = Cell> + '_ {
        let r = &self.ignitions;
        let min_x = index_at_least(center.x - PROJECT_SEARCH_RADIUS, r.x_offset, r.cell_width);
        let max_x = index_at_most(center.x + PROJECT_SEARCH_RADIUS, r.x_offset, r.cell_width, r.x_width);
        let min_y = index_at_least(center.y - PROJECT_SEARCH_RADIUS, r.y_offset, r.cell_width);
        let max_y = index_at_most(center.y + PROJECT_SEARCH_RADIUS, r.y_offset, r.cell_width, r.y_height);
        let center = *center;
        (min_y..=max_y).flat_map(move |y| (min_x..=max_x).map(move |x| Cell { x, y })).filter(move |c| {
            self.ignitions.as_position(*c).dist(&center) <= PROJECT_SEARCH_RADIUS
        })
    }
}

fn cell_time(raster: &Raster<f64>, cell: Cell) -> f64 {
    let v = raster.value(cell);
    // NaN marks never-ignited cells in simulator output
    if v.is_nan() {
        f64::INFINITY
    } else {
        v
    }
}

fn index_at_least(coord: f64, offset: f64, cell_width: f64) -> usize {
    (((coord - offset) / cell_width).ceil().max(0.0)) as usize
}

fn index_at_most(coord: f64, offset: f64, cell_width: f64, width: usize) -> usize {
    let i = ((coord - offset) / cell_width).floor();
    if i < 0.0 {
        0
    } else {
        (i as usize).min(width.saturating_sub(1))
    }
}
