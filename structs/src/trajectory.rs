//! Per-UAV flight plans: ordered oriented segments with cached timing and a
//! frozen prefix for the already-flown portion.

use serde::{Deserialize, Serialize};

use crate::dubins::DubinsPath;
use crate::error::{Error, Result};
use crate::uav::Uav;
use crate::{Segment3d, Waypoint3d};

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct TrajectoryConfig {
    pub uav: Uav,
    pub start_waypoint: Option<Waypoint3d>,
    pub end_waypoint: Option<Waypoint3d>,
    /// Takeoff time (s).
    pub start_time: f64,
    /// Flight-time budget (s).
    pub max_flight_time: f64,
}

impl TrajectoryConfig {
    pub fn new(uav: Uav, start_time: f64, max_flight_time: f64) -> Self {
        assert!(max_flight_time >= 0.0);
        TrajectoryConfig { uav, start_waypoint: None, end_waypoint: None, start_time, max_flight_time }
    }

    pub fn with_start_waypoint(mut self, wp: Waypoint3d) -> Self {
        self.start_waypoint = Some(wp);
        self
    }

    pub fn with_end_waypoint(mut self, wp: Waypoint3d) -> Self {
        self.end_waypoint = Some(wp);
        self
    }
}

/// Ordered segments flown by one UAV.
///
/// Segment start times are cached: `start_times[0]` is the configured start
/// time and each following segment starts after the previous segment plus
/// the Dubins connection between them. Segments before `first_modifiable`
/// are frozen; a configured end waypoint pins the last segment.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Trajectory {
    conf: TrajectoryConfig,
    segments: Vec<Segment3d>,
    start_times: Vec<f64>,
    first_modifiable: usize,
    end_pinned: bool,
}

const BUDGET_EPS: f64 = 1e-9;

impl Trajectory {
    pub fn new(conf: TrajectoryConfig) -> Self {
        let mut traj = Trajectory {
            conf,
            segments: Vec::new(),
            start_times: Vec::new(),
            first_modifiable: 0,
            end_pinned: false,
        };
        if let Some(wp) = traj.conf.start_waypoint {
            traj.segments.push(Segment3d::from_waypoint(wp));
            traj.first_modifiable = 1;
        }
        if let Some(wp) = traj.conf.end_waypoint {
            traj.segments.push(Segment3d::from_waypoint(wp));
            traj.end_pinned = true;
        }
        traj.recompute_times_from(0);
        traj
    }

    pub fn conf(&self) -> &TrajectoryConfig {
        &self.conf
    }

    pub fn uav(&self) -> &Uav {
        &self.conf.uav
    }

    pub fn size(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment3d] {
        &self.segments
    }

    pub fn segment(&self, i: usize) -> Option<&Segment3d> {
        self.segments.get(i)
    }

    pub fn start_time(&self, i: usize) -> f64 {
        self.start_times[i]
    }

    pub fn end_time(&self, i: usize) -> f64 {
        self.start_times[i] + self.segments[i].length / self.conf.uav.max_air_speed
    }

    pub fn first_modifiable(&self) -> usize {
        self.first_modifiable
    }

    /// Index of the last segment that may be erased or replaced, if any.
    pub fn last_modifiable(&self) -> Option<usize> {
        let end = self.segments.len().checked_sub(if self.end_pinned { 2 } else { 1 })?;
        (end >= self.first_modifiable).then_some(end)
    }

    /// Valid insertion indices: after the frozen prefix, before a pinned end.
    pub fn insertion_indices(&self) -> std::ops::RangeInclusive<usize> {
        self.first_modifiable..=(self.segments.len() - usize::from(self.end_pinned))
    }

    /// Total flight time from takeoff to the end of the last segment.
    pub fn duration(&self) -> f64 {
        match self.segments.len() {
            0 => 0.0,
            n => self.end_time(n - 1) - self.conf.start_time,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.duration() <= self.conf.max_flight_time + BUDGET_EPS
    }

    /// Flight time added by putting `seg` at index `i`.
    fn insertion_duration_delta(&self, i: usize, seg: &Segment3d) -> f64 {
        let uav = &self.conf.uav;
        let mut delta = seg.length / uav.max_air_speed;
        let prev = (i > 0).then(|| &self.segments[i - 1]);
        let next = self.segments.get(i);
        if let Some(p) = prev {
            delta += uav.travel_time(&p.end.as_2d(), &seg.start.as_2d());
        }
        if let Some(n) = next {
            delta += uav.travel_time(&seg.end.as_2d(), &n.start.as_2d());
        }
        if let (Some(p), Some(n)) = (prev, next) {
            delta -= uav.travel_time(&p.end.as_2d(), &n.start.as_2d());
        }
        delta
    }

    pub fn insert(&mut self, i: usize, seg: Segment3d) -> Result<()> {
        if i < self.first_modifiable {
            return Err(Error::FrozenPrefixViolation { index: i, first_modifiable: self.first_modifiable });
        }
        if !self.insertion_indices().contains(&i) {
            return Err(Error::IndexOutOfRange { index: i, len: self.segments.len() });
        }
        if self.duration() + self.insertion_duration_delta(i, &seg) > self.conf.max_flight_time + BUDGET_EPS {
            return Err(Error::FlightTimeExceeded);
        }
        self.segments.insert(i, seg);
        self.recompute_times_from(i);
        Ok(())
    }

    pub fn erase(&mut self, i: usize) -> Result<Segment3d> {
        if i >= self.segments.len() {
            return Err(Error::IndexOutOfRange { index: i, len: self.segments.len() });
        }
        if i < self.first_modifiable || self.last_modifiable().is_none_or(|last| i > last) {
            return Err(Error::FrozenPrefixViolation { index: i, first_modifiable: self.first_modifiable });
        }
        let removed = self.segments.remove(i);
        self.recompute_times_from(i);
        Ok(removed)
    }

    /// Erase `n_replaced` segments at `i` and insert `segments` in their
    /// place, checked and applied as a single update.
    pub fn replace(&mut self, i: usize, n_replaced: usize, segments: &[Segment3d]) -> Result<Vec<Segment3d>> {
        assert!(n_replaced > 0);
        if i < self.first_modifiable {
            return Err(Error::FrozenPrefixViolation { index: i, first_modifiable: self.first_modifiable });
        }
        let last_replaced = i + n_replaced - 1;
        if self.last_modifiable().is_none_or(|last| last_replaced > last) {
            return Err(Error::IndexOutOfRange { index: last_replaced, len: self.segments.len() });
        }

        let mut updated = self.clone();
        let removed: Vec<Segment3d> = updated.segments.splice(i..i + n_replaced, segments.iter().copied()).collect();
        updated.recompute_times_from(i);
        if !updated.is_valid() {
            return Err(Error::FlightTimeExceeded);
        }
        *self = updated;
        Ok(removed)
    }

    /// Freeze every segment that starts at or before `t`.
    pub fn freeze_before(&mut self, t: f64) {
        let frozen = self.start_times.iter().take_while(|start| **start <= t).count();
        self.first_modifiable = self.first_modifiable.max(frozen);
    }

    pub fn freeze_all(&mut self) {
        self.first_modifiable = self.segments.len();
    }

    /// Altitude flown by this trajectory, from the first known waypoint.
    pub fn flight_altitude(&self) -> f64 {
        self.segments
            .first()
            .map(|s| s.start.z)
            .or_else(|| self.conf.start_waypoint.map(|wp| wp.z))
            .unwrap_or(0.0)
    }

    /// The flight path, Dubins-sampled every `step` meters.
    pub fn sampled(&self, step: f64) -> Vec<Waypoint3d> {
        let mut path = Vec::new();
        for (i, seg) in self.segments.iter().enumerate() {
            if let Some(prev) = i.checked_sub(1).map(|j| &self.segments[j]) {
                let dubins =
                    DubinsPath::shortest(&prev.end.as_2d(), &seg.start.as_2d(), self.conf.uav.min_turn_radius);
                let total = dubins.length();
                for (x, y, dir, s) in dubins.sample(step) {
                    // climb linearly along the connector
                    let frac = if total > 0.0 { s / total } else { 1.0 };
                    path.push(Waypoint3d::new(x, y, prev.end.z + (seg.start.z - prev.end.z) * frac, dir));
                }
            }
            path.push(seg.start);
            if seg.length > 0.0 {
                path.push(seg.end);
            }
        }
        path
    }

    fn recompute_times_from(&mut self, i: usize) {
        self.start_times.truncate(i);
        let uav = &self.conf.uav;
        for j in i..self.segments.len() {
            let t = if j == 0 {
                self.conf.start_time
            } else {
                let prev = &self.segments[j - 1];
                self.start_times[j - 1]
                    + prev.length / uav.max_air_speed
                    + uav.travel_time(&prev.end.as_2d(), &self.segments[j].start.as_2d())
            };
            self.start_times.push(t);
        }
    }
}

/// The trajectories of a plan, one per UAV, keyed by unique UAV id.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Trajectories(Vec<Trajectory>);

impl Trajectories {
    pub fn new(confs: Vec<TrajectoryConfig>) -> Self {
        let trajs: Vec<Trajectory> = confs.into_iter().map(Trajectory::new).collect();
        for (i, a) in trajs.iter().enumerate() {
            for b in &trajs[i + 1..] {
                assert!(a.uav().id != b.uav().id, "duplicate UAV id {}", a.uav().id);
            }
        }
        Trajectories(trajs)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Trajectory> {
        self.0.get(i)
    }

    pub fn get_mut(&mut self, i: usize) -> Option<&mut Trajectory> {
        self.0.get_mut(i)
    }

    pub fn by_uav(&self, uav_id: &str) -> Option<&Trajectory> {
        self.0.iter().find(|t| t.uav().id == uav_id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trajectory> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Trajectory> {
        self.0.iter_mut()
    }

    pub fn duration(&self) -> f64 {
        self.0.iter().map(|t| t.duration()).sum()
    }

    pub fn num_segments(&self) -> usize {
        self.0.iter().map(|t| t.size()).sum()
    }

    pub fn is_valid(&self) -> bool {
        self.0.iter().all(|t| t.is_valid())
    }

    /// Freeze every trajectory up to time `t`.
    pub fn freeze_before(&mut self, t: f64) {
        for traj in self.0.iter_mut() {
            traj.freeze_before(t);
        }
    }

    pub fn freeze_trajectory(&mut self, uav_id: &str) {
        if let Some(traj) = self.0.iter_mut().find(|t| t.uav().id == uav_id) {
            traj.freeze_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Position3d, Waypoint3d};

    fn test_uav() -> Uav {
        Uav::new("x8-01", 10.0, 10.0, 20.0, 20.0)
    }

    /// Waypoints on the x axis all heading +x, so Dubins distances reduce to
    /// straight lines and timing can be checked by hand.
    fn aligned_segment(x: f64, len: f64) -> Segment3d {
        Segment3d::from_length(Waypoint3d::new(x, 0.0, 30.0, 0.0), len)
    }

    #[test]
    fn timing_recurrence() {
        let conf = TrajectoryConfig::new(test_uav(), 50.0, 1000.0)
            .with_start_waypoint(Waypoint3d::new(0.0, 0.0, 30.0, 0.0));
        let mut traj = Trajectory::new(conf);
        traj.insert(1, aligned_segment(100.0, 40.0)).unwrap();
        traj.insert(2, aligned_segment(200.0, 10.0)).unwrap();

        // start at 50, 100 m to reach the first segment at 10 m/s
        assert!((traj.start_time(0) - 50.0).abs() < 1e-6);
        assert!((traj.start_time(1) - 60.0).abs() < 1e-6);
        assert!((traj.end_time(1) - 64.0).abs() < 1e-6);
        // 60 m gap from x=140 to x=200
        assert!((traj.start_time(2) - 70.0).abs() < 1e-6);
        assert!((traj.duration() - 21.0).abs() < 1e-6);
    }

    #[test]
    fn insert_rejects_budget_overrun() {
        let conf = TrajectoryConfig::new(test_uav(), 0.0, 15.0)
            .with_start_waypoint(Waypoint3d::new(0.0, 0.0, 30.0, 0.0));
        let mut traj = Trajectory::new(conf);
        traj.insert(1, aligned_segment(100.0, 0.0)).unwrap();
        let before = traj.clone();
        assert_eq!(traj.insert(2, aligned_segment(300.0, 0.0)), Err(Error::FlightTimeExceeded));
        assert_eq!(traj, before);
    }

    #[test]
    fn frozen_prefix_is_immutable() {
        let conf = TrajectoryConfig::new(test_uav(), 0.0, 1000.0)
            .with_start_waypoint(Waypoint3d::new(0.0, 0.0, 30.0, 0.0));
        let mut traj = Trajectory::new(conf);
        traj.insert(1, aligned_segment(50.0, 0.0)).unwrap();
        assert!(matches!(traj.insert(0, aligned_segment(10.0, 0.0)), Err(Error::FrozenPrefixViolation { .. })));
        assert!(matches!(traj.erase(0), Err(Error::FrozenPrefixViolation { .. })));
        assert!(matches!(traj.replace(0, 1, &[aligned_segment(10.0, 0.0)]), Err(Error::FrozenPrefixViolation { .. })));
    }

    #[test]
    fn pinned_end_cannot_be_touched() {
        let conf = TrajectoryConfig::new(test_uav(), 0.0, 1000.0)
            .with_start_waypoint(Waypoint3d::new(0.0, 0.0, 30.0, 0.0))
            .with_end_waypoint(Waypoint3d::new(500.0, 0.0, 30.0, 0.0));
        let mut traj = Trajectory::new(conf);
        traj.insert(1, aligned_segment(100.0, 0.0)).unwrap();
        assert_eq!(traj.size(), 3);
        assert!(traj.erase(2).is_err());
        assert!(matches!(traj.insert(3, aligned_segment(600.0, 0.0)), Err(Error::IndexOutOfRange { .. })));
        // inserting before the pinned end is fine
        traj.insert(2, aligned_segment(200.0, 0.0)).unwrap();
        assert_eq!(traj.segments()[3].start.x, 500.0);
    }

    #[test]
    fn erase_and_replace_update_times() {
        let conf = TrajectoryConfig::new(test_uav(), 0.0, 1000.0)
            .with_start_waypoint(Waypoint3d::new(0.0, 0.0, 30.0, 0.0));
        let mut traj = Trajectory::new(conf);
        traj.insert(1, aligned_segment(100.0, 0.0)).unwrap();
        traj.insert(2, aligned_segment(200.0, 0.0)).unwrap();
        traj.erase(1).unwrap();
        assert!((traj.start_time(1) - 20.0).abs() < 1e-6);

        let removed = traj.replace(1, 1, &[aligned_segment(300.0, 0.0)]).unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].start.x, 200.0);
        assert!((traj.start_time(1) - 30.0).abs() < 1e-6);
    }

    #[test]
    fn freeze_before_is_monotone() {
        let conf = TrajectoryConfig::new(test_uav(), 0.0, 1000.0)
            .with_start_waypoint(Waypoint3d::new(0.0, 0.0, 30.0, 0.0));
        let mut traj = Trajectory::new(conf);
        traj.insert(1, aligned_segment(100.0, 0.0)).unwrap();
        traj.insert(2, aligned_segment(200.0, 0.0)).unwrap();

        traj.freeze_before(15.0);
        assert_eq!(traj.first_modifiable(), 2);
        traj.freeze_before(5.0);
        assert_eq!(traj.first_modifiable(), 2);
        traj.freeze_before(1e9);
        assert_eq!(traj.first_modifiable(), 3);
    }

    #[test]
    fn zero_budget_admits_only_the_pinned_start() {
        let conf = TrajectoryConfig::new(test_uav(), 0.0, 0.0)
            .with_start_waypoint(Waypoint3d::new(0.0, 0.0, 30.0, 0.0));
        let mut traj = Trajectory::new(conf);
        assert!(traj.is_valid());
        assert_eq!(traj.size(), 1);
        assert_eq!(traj.insert(1, aligned_segment(10.0, 5.0)), Err(Error::FlightTimeExceeded));
    }

    #[test]
    fn unique_uav_ids_are_enforced() {
        let confs = vec![
            TrajectoryConfig::new(Uav::new("a", 1.0, 1.0, 1.0, 1.0), 0.0, 10.0),
            TrajectoryConfig::new(Uav::new("b", 1.0, 1.0, 1.0, 1.0), 0.0, 10.0),
        ];
        let mut trajs = Trajectories::new(confs);
        assert!(trajs.by_uav("a").is_some());
        assert!(trajs.by_uav("c").is_none());

        trajs.get_mut(0).unwrap().insert(0, Segment3d::from_waypoint(Waypoint3d::new(5.0, 0.0, 30.0, 0.0))).unwrap();
        trajs.freeze_trajectory("a");
        assert_eq!(trajs.by_uav("a").unwrap().first_modifiable(), 1);
        assert_eq!(trajs.by_uav("b").unwrap().first_modifiable(), 0);
    }

    #[test]
    fn sampled_path_follows_the_segments() {
        let conf = TrajectoryConfig::new(test_uav(), 0.0, 1000.0)
            .with_start_waypoint(Waypoint3d::new(0.0, 0.0, 30.0, 0.0));
        let mut traj = Trajectory::new(conf);
        traj.insert(1, aligned_segment(100.0, 40.0)).unwrap();

        let path = traj.sampled(10.0);
        assert!(path.len() >= 10);
        assert_eq!(path[0].as_point(), Position3d::new(0.0, 0.0, 30.0));
        let last = path.last().unwrap();
        assert!((last.x - 140.0).abs() < 1e-6);
        // a straight connector keeps the heading
        assert!(path.iter().all(|wp| wp.dir.abs() < 1e-6));
    }
}
