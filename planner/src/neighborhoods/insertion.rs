use fireobs_structs::plan::Plan;
use fireobs_structs::{Segment3d, Waypoint3d};
use log::trace;
use ordered_float::OrderedFloat;
use rand::Rng;
use rand_chacha::ChaChaRng;

use super::{uncovered_observations, Neighborhood};
use crate::updates::PlanUpdate;

/// Insert a new observation segment over a still-uncovered ignited cell, at
/// the trajectory and index with the best scored placement.
pub struct SegmentInsertion {
    /// Weight of the added flight time against the utility gain.
    pub lambda: f64,
}

impl Default for SegmentInsertion {
    fn default() -> Self {
        SegmentInsertion { lambda: 1e-4 }
    }
}

impl SegmentInsertion {
    fn score(&self, plan: &Plan) -> f64 {
        plan.utility() + self.lambda * plan.duration()
    }
}

impl Neighborhood for SegmentInsertion {
    fn name(&self) -> &'static str {
        "segment-insertion"
    }

    fn propose(&self, plan: &Plan, rng: &mut ChaChaRng) -> Option<PlanUpdate> {
        #[cfg(feature = "prof")]
        let _p = hprof::enter("insertion propose");
        let uncovered = uncovered_observations(plan);
        if uncovered.is_empty() {
            return None;
        }
        let target = uncovered[rng.gen_range(0..uncovered.len())];
        let heading = rng.gen_range(-std::f64::consts::PI..std::f64::consts::PI);

        let base_score = self.score(plan);
        let mut scored = Vec::new();
        for (traj_idx, traj) in plan.trajectories().iter().enumerate() {
            let segment = Segment3d::from_waypoint(Waypoint3d::new(
                target.pt.x,
                target.pt.y,
                traj.flight_altitude(),
                heading,
            ));
            for index in traj.insertion_indices() {
                let update = PlanUpdate::Insert { traj: traj_idx, index, segment };
                let mut candidate = plan.clone();
                if update.apply(&mut candidate).is_err() {
                    continue;
                }
                scored.push((self.score(&candidate), update));
            }
        }

        let (score, update) = scored.into_iter().min_by_key(|(score, _)| OrderedFloat(*score))?;
        if score >= base_score {
            trace!("no improving placement for cell ({}, {})", target.pt.x, target.pt.y);
            return None;
        }
        Some(update)
    }
}
