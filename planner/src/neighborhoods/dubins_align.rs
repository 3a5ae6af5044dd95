//! Local moves that re-orient segment headings to shorten the Dubins
//! connectors between them. All of them keep visibility centers in place, so
//! the observed cells stay (almost) the same while the flight path relaxes.

use fireobs_structs::plan::Plan;
use fireobs_structs::{normalize_angle, Segment3d, Waypoint3d};
use rand::Rng;
use rand_chacha::ChaChaRng;

use super::{modifiable_segments, Neighborhood};
use crate::updates::PlanUpdate;

const MIN_ALIGN_DIST: f64 = 1e-6;
const MIN_HEADING_CHANGE: f64 = 1e-3;

/// The same segment rotated to `dir` about its visibility center.
fn with_heading(seg: &Segment3d, dir: f64) -> Segment3d {
    let center = seg.visibility_center();
    let half = seg.xy_length / 2.0;
    let start = Waypoint3d::new(center.x - dir.cos() * half, center.y - dir.sin() * half, seg.start.z, dir);
    if seg.xy_length > 0.0 {
        Segment3d::from_length(start, seg.xy_length)
    } else {
        Segment3d::from_waypoint(start)
    }
}

/// Consecutive (trajectory, index) pairs where both segments are modifiable.
fn modifiable_pairs(plan: &Plan) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    for (t, traj) in plan.trajectories().iter().enumerate() {
        if let Some(last) = traj.last_modifiable() {
            out.extend((traj.first_modifiable()..last).map(|i| (t, i)));
        }
    }
    out
}

fn pick<T: Copy>(items: &[T], rng: &mut ChaChaRng) -> Option<T> {
    if items.is_empty() {
        None
    } else {
        Some(items[rng.gen_range(0..items.len())])
    }
}

fn random_heading(rng: &mut ChaChaRng) -> f64 {
    rng.gen_range(-std::f64::consts::PI..std::f64::consts::PI)
}

/// Orient two consecutive segments along the line joining their centers.
pub struct AlignTwoConsecutive;

impl Neighborhood for AlignTwoConsecutive {
    fn name(&self) -> &'static str {
        "align-two-consecutive"
    }

    fn propose(&self, plan: &Plan, rng: &mut ChaChaRng) -> Option<PlanUpdate> {
        let (t, i) = pick(&modifiable_pairs(plan), rng)?;
        let traj = plan.trajectories().get(t)?;
        let (s1, s2) = (traj.segments()[i], traj.segments()[i + 1]);
        let (c1, c2) = (s1.visibility_center(), s2.visibility_center());
        if c1.dist(&c2) < MIN_ALIGN_DIST {
            return None;
        }
        let dir = c1.angle_to(&c2);
        if normalize_angle(s1.start.dir - dir).abs() < MIN_HEADING_CHANGE
            && normalize_angle(s2.start.dir - dir).abs() < MIN_HEADING_CHANGE
        {
            return None;
        }
        Some(PlanUpdate::Replace {
            traj: t,
            index: i,
            n_replaced: 2,
            segments: vec![with_heading(&s1, dir), with_heading(&s2, dir)],
        })
    }
}

/// Give one modifiable segment a fresh random heading.
pub struct OrientationChange;

impl Neighborhood for OrientationChange {
    fn name(&self) -> &'static str {
        "orientation-change"
    }

    fn propose(&self, plan: &Plan, rng: &mut ChaChaRng) -> Option<PlanUpdate> {
        let (t, i) = pick(&modifiable_segments(plan), rng)?;
        let seg = plan.trajectories().get(t)?.segments()[i];
        let dir = random_heading(rng);
        Some(PlanUpdate::replace_one(t, i, with_heading(&seg, dir)))
    }
}

/// Fresh random headings for two consecutive segments at once.
pub struct TwoOrientationChange;

impl Neighborhood for TwoOrientationChange {
    fn name(&self) -> &'static str {
        "two-orientation-change"
    }

    fn propose(&self, plan: &Plan, rng: &mut ChaChaRng) -> Option<PlanUpdate> {
        let (t, i) = pick(&modifiable_pairs(plan), rng)?;
        let traj = plan.trajectories().get(t)?;
        let (s1, s2) = (traj.segments()[i], traj.segments()[i + 1]);
        let (d1, d2) = (random_heading(rng), random_heading(rng));
        Some(PlanUpdate::Replace {
            traj: t,
            index: i,
            n_replaced: 2,
            segments: vec![with_heading(&s1, d1), with_heading(&s2, d2)],
        })
    }
}

/// Orient a segment towards the center of its successor.
pub struct AlignOnNext;

impl Neighborhood for AlignOnNext {
    fn name(&self) -> &'static str {
        "align-on-next"
    }

    fn propose(&self, plan: &Plan, rng: &mut ChaChaRng) -> Option<PlanUpdate> {
        let with_successor: Vec<_> = modifiable_segments(plan)
            .into_iter()
            .filter(|(t, i)| plan.trajectories().get(*t).is_some_and(|traj| i + 1 < traj.size()))
            .collect();
        let (t, i) = pick(&with_successor, rng)?;
        let traj = plan.trajectories().get(t)?;
        let seg = traj.segments()[i];
        let (c, c_next) = (seg.visibility_center(), traj.segments()[i + 1].visibility_center());
        if c.dist(&c_next) < MIN_ALIGN_DIST {
            return None;
        }
        let dir = c.angle_to(&c_next);
        if normalize_angle(seg.start.dir - dir).abs() < MIN_HEADING_CHANGE {
            return None;
        }
        Some(PlanUpdate::replace_one(t, i, with_heading(&seg, dir)))
    }
}

/// Orient a segment away from the center of its predecessor.
pub struct AlignOnPrev;

impl Neighborhood for AlignOnPrev {
    fn name(&self) -> &'static str {
        "align-on-prev"
    }

    fn propose(&self, plan: &Plan, rng: &mut ChaChaRng) -> Option<PlanUpdate> {
        let with_predecessor: Vec<_> =
            modifiable_segments(plan).into_iter().filter(|(_, i)| *i >= 1).collect();
        let (t, i) = pick(&with_predecessor, rng)?;
        let traj = plan.trajectories().get(t)?;
        let seg = traj.segments()[i];
        let (c_prev, c) = (traj.segments()[i - 1].visibility_center(), seg.visibility_center());
        if c_prev.dist(&c) < MIN_ALIGN_DIST {
            return None;
        }
        let dir = c_prev.angle_to(&c);
        if normalize_angle(seg.start.dir - dir).abs() < MIN_HEADING_CHANGE {
            return None;
        }
        Some(PlanUpdate::replace_one(t, i, with_heading(&seg, dir)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fireobs_structs::Waypoint3d;

    #[test]
    fn rotation_preserves_the_visibility_center() {
        let seg = Segment3d::from_length(Waypoint3d::new(10.0, 20.0, 30.0, 0.0), 40.0);
        let rotated = with_heading(&seg, 1.3);
        let (c0, c1) = (seg.visibility_center(), rotated.visibility_center());
        assert!(c0.dist(&c1) < 1e-9);
        assert!((rotated.start.dir - 1.3).abs() < 1e-9);
        assert!((rotated.xy_length - 40.0).abs() < 1e-9);
    }

    #[test]
    fn zero_length_rotation_keeps_the_point() {
        let seg = Segment3d::from_waypoint(Waypoint3d::new(5.0, 5.0, 30.0, 0.5));
        let rotated = with_heading(&seg, -2.0);
        assert_eq!(rotated.start.as_point(), seg.start.as_point());
        assert_eq!(rotated.length, 0.0);
    }
}
