use fireobs_structs::plan::Plan;
use fireobs_structs::{Segment3d, Waypoint3d};
use rand::Rng;
use rand_chacha::ChaChaRng;

use super::{modifiable_segments, uncovered_observations, Neighborhood};
use crate::updates::PlanUpdate;

/// Replace an existing modifiable segment by one anchored on an uncovered
/// cell nearby.
pub struct SegmentReplacement {
    pub search_radius: f64,
}

impl Default for SegmentReplacement {
    fn default() -> Self {
        SegmentReplacement { search_radius: 500.0 }
    }
}

impl Neighborhood for SegmentReplacement {
    fn name(&self) -> &'static str {
        "segment-replacement"
    }

    fn propose(&self, plan: &Plan, rng: &mut ChaChaRng) -> Option<PlanUpdate> {
        let modifiable = modifiable_segments(plan);
        if modifiable.is_empty() {
            return None;
        }
        let (traj_idx, index) = modifiable[rng.gen_range(0..modifiable.len())];
        let seg = *plan.trajectories().get(traj_idx)?.segment(index)?;
        let center = seg.visibility_center();

        let nearby: Vec<_> = uncovered_observations(plan)
            .into_iter()
            .filter(|possible| possible.pt.dist(&center) <= self.search_radius)
            .collect();
        if nearby.is_empty() {
            return None;
        }
        let target = nearby[rng.gen_range(0..nearby.len())];
        let heading = rng.gen_range(-std::f64::consts::PI..std::f64::consts::PI);

        let half = seg.xy_length / 2.0;
        let start = Waypoint3d::new(
            target.pt.x - heading.cos() * half,
            target.pt.y - heading.sin() * half,
            seg.start.z,
            heading,
        );
        let replacement = if seg.xy_length > 0.0 {
            Segment3d::from_length(start, seg.xy_length)
        } else {
            Segment3d::from_waypoint(start)
        };
        Some(PlanUpdate::replace_one(traj_idx, index, replacement))
    }
}
