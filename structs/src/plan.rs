//! Observation plans: a set of trajectories scored against the fire
//! prediction over a time window of interest.

use std::collections::BTreeSet;
use std::sync::Arc;

use log::debug;
use serde_json::json;

use crate::error::{Error, Result};
use crate::firedata::FireData;
use crate::raster::{Cell, GridLayout};
use crate::report::{PlanView, TrajectoryView, WaypointTime};
use crate::trajectory::{Trajectories, TrajectoryConfig};
use crate::{PointTimeWindow, PositionTime, Segment3d, TimeWindow};

/// Observations closer than this to an existing one carry no information (m).
pub const REDUNDANT_OBS_DIST: f64 = 50.0;

/// Observations farther than this contribute nothing to a cell (m).
pub const MAX_INFORMATIVE_DISTANCE: f64 = 500.0;

/// Dubins-to-euclidean detour ratio above which a connection counts as a
/// tight loop and the following segment is smoothed away.
const TIGHT_LOOP_RATIO: f64 = 2.0;

/// Cells covered by the camera footprint of `segment`.
///
/// The footprint rectangle ABCD sits `view_depth / 2` behind the segment
/// start, is `view_width` wide and `length + view_depth` long. Candidate
/// points are walked on a half-cell sub-grid over the clamped bounding box
/// and kept when the two-dot-product rectangle test passes.
pub fn segment_trace(segment: &Segment3d, view_width: f64, view_depth: f64, raster: &impl GridLayout) -> BTreeSet<Cell> {
    let dir = segment.start.dir;
    let w = view_width;
    let l = segment.xy_length;

    let ssx = segment.start.x - dir.cos() * view_depth / 2.0;
    let ssy = segment.start.y - dir.sin() * view_depth / 2.0;

    let (ax, ay) = (ssx + (dir + std::f64::consts::FRAC_PI_2).cos() * w / 2.0, ssy + (dir + std::f64::consts::FRAC_PI_2).sin() * w / 2.0);
    let (bx, by) = (ssx - (dir + std::f64::consts::FRAC_PI_2).cos() * w / 2.0, ssy - (dir + std::f64::consts::FRAC_PI_2).sin() * w / 2.0);
    let (cx, cy) = (ax + dir.cos() * (l + view_depth), ay + dir.sin() * (l + view_depth));
    let (dx_, dy_) = (bx + dir.cos() * (l + view_depth), by + dir.sin() * (l + view_depth));

    let cw = raster.cell_width();
    let x_lo = raster.x_offset() - cw / 2.0;
    let x_hi = raster.x_offset() + raster.x_width() as f64 * cw - cw / 2.0;
    let y_lo = raster.y_offset() - cw / 2.0;
    let y_hi = raster.y_offset() + raster.y_height() as f64 * cw - cw / 2.0;

    let min_x = (ax.min(bx).min(cx).min(dx_) - cw).clamp(x_lo, x_hi);
    let max_x = (ax.max(bx).max(cx).max(dx_) + cw).clamp(x_lo, x_hi);
    let min_y = (ay.min(by).min(cy).min(dy_) - cw).clamp(y_lo, y_hi);
    let max_y = (ay.max(by).max(cy).max(dy_) + cw).clamp(y_lo, y_hi);

    let mut trace = BTreeSet::new();
    let mut ix = min_x;
    while ix <= max_x {
        let mut iy = min_y;
        while iy <= max_y {
            if in_rectangle(ix, iy, ax, ay, bx, by, cx, cy) && raster.is_x_in(ix) && raster.is_y_in(iy) {
                trace.insert(Cell { x: raster.x_index(ix), y: raster.y_index(iy) });
            }
            iy += cw / 2.0;
        }
        ix += cw / 2.0;
    }
    trace
}

fn dot(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    x1 * x2 + y1 * y2
}

/// Whether the point (x, y) is in the rectangle defined by its two
/// perpendicular sides AB and AC.
fn in_rectangle(x: f64, y: f64, ax: f64, ay: f64, bx: f64, by: f64, cx: f64, cy: f64) -> bool {
    let dot_ab_am = dot(bx - ax, by - ay, x - ax, y - ay);
    let dot_ab_ab = dot(bx - ax, by - ay, bx - ax, by - ay);
    let dot_ac_am = dot(cx - ax, cy - ay, x - ax, y - ay);
    let dot_ac_ac = dot(cx - ax, cy - ay, cx - ax, cy - ay);
    0.0 <= dot_ab_am && dot_ab_am <= dot_ab_ab && 0.0 <= dot_ac_am && dot_ac_am <= dot_ac_ac
}

/// A named set of trajectories over a shared fire prediction.
#[derive(Clone, Debug, PartialEq)]
pub struct Plan {
    pub name: String,
    trajs: Trajectories,
    fire: Arc<FireData>,
    time_window: TimeWindow,
    observed_previously: Vec<PositionTime>,
    possible_observations: Vec<PointTimeWindow>,
}

impl Plan {
    pub fn new(
        name: impl Into<String>,
        confs: Vec<TrajectoryConfig>,
        fire: Arc<FireData>,
        time_window: TimeWindow,
        observed_previously: Vec<PositionTime>,
    ) -> Self {
        for conf in &confs {
            assert!(conf.start_time >= time_window.start && conf.start_time <= time_window.end);
        }

        let ignitions = fire.ignitions();
        let previously_observed_cells: Vec<Cell> =
            observed_previously.iter().filter(|pt| ignitions.is_in(&pt.pt)).map(|pt| ignitions.as_cell(&pt.pt)).collect();

        let mut possible_observations = Vec::new();
        for cell in ignitions.cells() {
            let t = fire.ignition(cell);
            if time_window.start <= t && t <= time_window.end && !previously_observed_cells.contains(&cell) {
                possible_observations.push(PointTimeWindow {
                    pt: ignitions.as_position(cell),
                    tw: TimeWindow { start: t, end: fire.traversal_end(cell) },
                });
            }
        }

        Plan {
            name: name.into(),
            trajs: Trajectories::new(confs),
            fire,
            time_window,
            observed_previously,
            possible_observations,
        }
    }

    pub fn trajectories(&self) -> &Trajectories {
        &self.trajs
    }

    pub fn fire(&self) -> &Arc<FireData> {
        &self.fire
    }

    pub fn time_window(&self) -> TimeWindow {
        self.time_window
    }

    pub fn possible_observations(&self) -> &[PointTimeWindow] {
        &self.possible_observations
    }

    pub fn is_valid(&self) -> bool {
        self.trajs.is_valid()
    }

    pub fn duration(&self) -> f64 {
        self.trajs.duration()
    }

    pub fn num_segments(&self) -> usize {
        self.trajs.num_segments()
    }

    /// All observations made by the plan within its time window, tagged with
    /// the start time of the observing segment.
    pub fn observations(&self) -> Vec<PositionTime> {
        self.observations_in(&self.time_window)
    }

    pub fn observations_in(&self, tw: &TimeWindow) -> Vec<PositionTime> {
        let mut obs = self.observed_previously.clone();
        for traj in self.trajs.iter() {
            let uav = traj.uav();
            for (seg_id, seg) in traj.segments().iter().enumerate() {
                let obs_time = traj.start_time(seg_id);
                let seg_tw = TimeWindow { start: obs_time, end: traj.end_time(seg_id) };
                if !tw.contains_window(&seg_tw) {
                    continue;
                }
                for cell in segment_trace(seg, uav.view_width, uav.view_depth, self.fire.ignitions()) {
                    if self.fire.is_burning(cell, obs_time) {
                        obs.push(PositionTime { pt: self.fire.ignitions().as_position(cell), time: obs_time });
                    }
                }
            }
        }
        obs
    }

    /// Cost of the plan, to minimise: the sum over every possibly-observable
    /// cell of its distance to the closest actual observation, normalized to
    /// [0, 1] with a dead band below `REDUNDANT_OBS_DIST` and saturation at
    /// `MAX_INFORMATIVE_DISTANCE`.
    pub fn utility(&self) -> f64 {
        let done = self.observations();
        let mut global = 0.0;
        for possible in &self.possible_observations {
            let mut min_dist = MAX_INFORMATIVE_DISTANCE;
            for obs in &done {
                min_dist = min_dist.min(possible.pt.dist(&obs.pt));
            }
            global += (min_dist.max(REDUNDANT_OBS_DIST) - REDUNDANT_OBS_DIST)
                / (MAX_INFORMATIVE_DISTANCE - REDUNDANT_OBS_DIST);
        }
        global
    }

    pub fn insert_segment(&mut self, traj: usize, at: usize, seg: Segment3d) -> Result<()> {
        self.trajectory_mut(traj)?.insert(at, seg)
    }

    pub fn erase_segment(&mut self, traj: usize, at: usize) -> Result<Segment3d> {
        self.trajectory_mut(traj)?.erase(at)
    }

    pub fn replace_segment(&mut self, traj: usize, at: usize, n_replaced: usize, segs: &[Segment3d]) -> Result<Vec<Segment3d>> {
        self.trajectory_mut(traj)?.replace(at, n_replaced, segs)
    }

    fn trajectory_mut(&mut self, traj: usize) -> Result<&mut crate::trajectory::Trajectory> {
        let len = self.trajs.len();
        self.trajs.get_mut(traj).ok_or(Error::IndexOutOfRange { index: traj, len })
    }

    /// Re-anchor every modifiable segment on the firefront, then smooth out
    /// tight loops.
    pub fn post_process(&mut self) {
        self.project_on_fire_front();
        self.smooth_trajectory();
    }

    /// Make sure every modifiable segment observes the fire while it
    /// traverses the overflown cell; segments with no projection are removed.
    pub fn project_on_fire_front(&mut self) {
        let fire = Arc::clone(&self.fire);
        for traj in self.trajs.iter_mut() {
            let mut seg_id = traj.first_modifiable();
            while traj.last_modifiable().is_some_and(|last| seg_id <= last) {
                let seg = traj.segments()[seg_id];
                let t = traj.start_time(seg_id);
                match fire.project_on_firefront(&seg, traj.uav(), t) {
                    Ok(projected) if projected.almost_eq(&seg) => seg_id += 1,
                    Ok(projected) => {
                        match traj.replace(seg_id, 1, &[projected]) {
                            Ok(_) => seg_id += 1,
                            Err(e) => {
                                // keep the unprojected segment rather than break the budget
                                debug!("projection of segment {seg_id} rejected: {e}");
                                seg_id += 1;
                            }
                        }
                    }
                    Err(_) => {
                        let _ = traj.erase(seg_id);
                    }
                }
            }
        }
    }

    /// Erase segments whose Dubins connection detours more than
    /// `TIGHT_LOOP_RATIO` times the straight-line distance.
    pub fn smooth_trajectory(&mut self) {
        for traj in self.trajs.iter_mut() {
            let mut seg_id = traj.first_modifiable();
            while traj.last_modifiable().is_some_and(|last| seg_id < last) {
                let current = &traj.segments()[seg_id];
                let next = &traj.segments()[seg_id + 1];
                let euclidean = current.end.as_point().hor_dist(&next.start.as_point());
                let dubins = traj.uav().travel_distance(&current.end.as_2d(), &next.start.as_2d());
                if dubins / euclidean > TIGHT_LOOP_RATIO {
                    let _ = traj.erase(seg_id + 1);
                } else {
                    seg_id += 1;
                }
            }
        }
    }

    /// The fixed execution contract: per UAV, the ordered waypoints with
    /// their overflight times.
    pub fn view(&self) -> PlanView {
        let trajectories = self
            .trajs
            .iter()
            .map(|traj| {
                let mut waypoints = Vec::new();
                for (i, seg) in traj.segments().iter().enumerate() {
                    waypoints.push(WaypointTime { waypoint: seg.start, time: traj.start_time(i) });
                    if seg.length > 0.0 {
                        waypoints.push(WaypointTime { waypoint: seg.end, time: traj.end_time(i) });
                    }
                }
                TrajectoryView { uav_id: traj.uav().id.clone(), waypoints }
            })
            .collect();
        PlanView { name: self.name.clone(), trajectories }
    }

    pub fn metadata(&self) -> serde_json::Value {
        json!({
            "name": self.name,
            "duration": self.duration(),
            "utility": self.utility(),
            "num_segments": self.num_segments(),
            "trajectories": self
                .trajs
                .iter()
                .map(|t| {
                    json!({
                        "uav": t.uav().id,
                        "duration": t.duration(),
                        "max_duration": t.conf().max_flight_time,
                        "num_segments": t.size(),
                    })
                })
                .collect::<Vec<_>>(),
        })
    }
}
